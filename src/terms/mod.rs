pub mod extract;
pub mod term;

pub use extract::{extract_terms, normalize_query, Extraction, Rejection};
pub use term::{percent_decode, percent_encode, Status, Term};
