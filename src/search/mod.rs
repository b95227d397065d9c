/// Term resolution and dispatch
pub mod dispatcher;
pub mod output;
pub mod resolver;
pub mod web_search;

pub use dispatcher::{DispatchOptions, DispatchSummary, Dispatcher};
pub use output::{ResultWriter, WriteSummary, MISSED_FILE, REJECTED_FILE};
pub use resolver::{Outcome, Resolver};
pub use web_search::{PageSearch, WebSearch};
