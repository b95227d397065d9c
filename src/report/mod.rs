/// Post-processing of search result files
pub mod check;
pub mod merge;

pub use check::{check_results, outfile_names, CheckStats};
pub use merge::{merge_results, MergeOptions, MergeStats};
