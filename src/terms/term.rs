/// Search terms and the percent-escaped keys they are dispatched under
use indexmap::IndexSet;
use std::fmt;

use crate::bio::taxonomy::Taxon;

pub const SPACE: &str = "%20";
pub const APOSTROPHE: &str = "%27";

/// Escape spaces and apostrophes for use in request URLs and map keys
pub fn percent_encode(term: &str) -> String {
    term.replace(' ', SPACE).replace('\'', APOSTROPHE)
}

pub fn percent_decode(term: &str) -> String {
    term.replace(SPACE, " ").replace(APOSTROPHE, "'")
}

/// Why the extractor refused an input query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    TooShort,
    UncertainEntry,
    Hybrid,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::TooShort => "tooShort",
            Status::UncertainEntry => "uncertainEntry",
            Status::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One distinct search key and every raw query that normalized to it.
///
/// The search term changes while the resolver retries (corrected spelling,
/// truncation); [`Term::key`] never does.
#[derive(Debug, Clone)]
pub struct Term {
    key: String,
    /// Untruncated spelling currently in use
    base: String,
    queries: IndexSet<String>,
    search_term: String,
    corrected: Option<String>,
    pub status: Option<Status>,
    resolution: Taxon,
    confirmed: bool,
}

impl Term {
    /// Create a term from a normalized (unescaped) search string
    pub fn new(search_term: &str) -> Self {
        let key = percent_encode(search_term.trim());
        Self {
            search_term: key.clone(),
            base: key.clone(),
            key,
            queries: IndexSet::new(),
            corrected: None,
            status: None,
            resolution: Taxon::new(),
            confirmed: false,
        }
    }

    pub fn with_query(search_term: &str, query: &str) -> Self {
        let mut term = Self::new(search_term);
        term.add_query(query);
        term
    }

    /// Record another raw input. Duplicates are ignored.
    pub fn add_query(&mut self, query: &str) -> bool {
        self.queries.insert(query.trim().to_string())
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(String::as_str)
    }

    /// The escaped search term the term was created with
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The escaped term currently being searched
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// The current search term with escapes removed
    pub fn display_term(&self) -> String {
        percent_decode(&self.search_term)
    }

    pub fn corrected(&self) -> Option<&str> {
        self.corrected.as_deref()
    }

    pub fn set_corrected(&mut self, corrected: &str) {
        let corrected = percent_encode(corrected.trim());
        if !corrected.is_empty() && corrected != self.key {
            self.corrected = Some(corrected);
        }
    }

    /// Search the corrected spelling from now on. Returns false if there is none.
    pub fn use_corrected(&mut self) -> bool {
        match self.corrected.take() {
            Some(corrected) => {
                self.corrected = Some(std::mem::replace(&mut self.base, corrected));
                self.search_term = self.base.clone();
                true
            }
            None => false,
        }
    }

    /// Undo [`Term::use_corrected`]
    pub fn use_original(&mut self) {
        if self.base != self.key {
            if let Some(original) = self.corrected.take() {
                self.corrected = Some(std::mem::replace(&mut self.base, original));
            }
        }
        self.search_term = self.base.clone();
    }

    pub fn word_count(&self) -> usize {
        self.search_term.matches(SPACE).count() + 1
    }

    /// Drop the leading word of the search term. Returns false for one-word terms.
    pub fn truncate(&mut self) -> bool {
        match self.search_term.split_once(SPACE) {
            Some((_, rest)) if !rest.trim().is_empty() => {
                self.search_term = rest.trim().to_string();
                true
            }
            _ => false,
        }
    }

    /// Undo any truncation
    pub fn reset(&mut self) {
        self.search_term = self.base.clone();
    }

    pub fn resolve(&mut self, taxon: Taxon, confirmed: bool) {
        self.resolution = taxon;
        self.confirmed = confirmed;
    }

    pub fn resolution(&self) -> &Taxon {
        &self.resolution
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    /// One `Query,SearchTerm,Kingdom..Species,Source,Confirmed` row per query
    pub fn match_rows(&self) -> Vec<Vec<String>> {
        let search_term = self.display_term();
        let confirmed = if self.confirmed { "yes" } else { "no" };
        self.queries
            .iter()
            .map(|query| {
                let mut row = vec![query.clone(), search_term.clone()];
                row.extend(self.resolution.to_record());
                row.push(confirmed.to_string());
                row
            })
            .collect()
    }

    /// One `Query,SearchTerm` row per query, using the original search term
    pub fn miss_rows(&self) -> Vec<Vec<String>> {
        let search_term = percent_decode(&self.key);
        self.queries
            .iter()
            .map(|query| vec![query.clone(), search_term.clone()])
            .collect()
    }
}
