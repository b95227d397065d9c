pub mod corpus;
pub mod hierarchy;
pub mod scorer;
pub mod taxonomy;

pub use corpus::{Corpus, CorpusHit};
pub use hierarchy::Hierarchy;
pub use scorer::{CandidateSet, Consensus, Scorer};
pub use taxonomy::{Rank, Taxon, NA};
