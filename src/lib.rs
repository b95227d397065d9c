pub mod bio;
pub mod cli;
pub mod core;
pub mod download;
pub mod report;
pub mod search;
pub mod sources;
pub mod terms;
pub mod utils;

pub use crate::bio::{corpus::Corpus, hierarchy::Hierarchy, scorer::Scorer, taxonomy::Taxon};
pub use crate::search::{dispatcher::Dispatcher, resolver::Resolver};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KestrelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KestrelError>;
