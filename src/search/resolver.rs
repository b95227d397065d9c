/// Per-term resolution: corpus, adapters, web fallback, then truncation
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::web_search::PageSearch;
use crate::bio::corpus::Corpus;
use crate::bio::hierarchy::Hierarchy;
use crate::bio::scorer::{CandidateSet, Scorer};
use crate::bio::taxonomy::species_caps;
use crate::sources::{Registry, SpellChecker};
use crate::terms::{percent_decode, Term};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a term left the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    Missed,
    /// Shutdown was requested; nothing should be written for this term
    Cancelled,
}

/// Runs the resolution sequence for one term at a time.
///
/// Shared read-only by every dispatch task. The corpus and hierarchy are
/// immutable snapshots built before dispatch begins.
pub struct Resolver {
    corpus: Option<Arc<Corpus>>,
    /// Resolve terms from the corpus before asking the sources
    corpus_lookup: bool,
    hierarchy: Arc<Hierarchy>,
    adapters: Registry,
    web: Option<Arc<dyn PageSearch>>,
    speller: Option<Arc<dyn SpellChecker>>,
    scorer: Scorer,
    timeout: Duration,
}

impl Resolver {
    pub fn new(adapters: Registry) -> Self {
        Self {
            corpus: None,
            corpus_lookup: true,
            hierarchy: Arc::new(Hierarchy::default()),
            adapters,
            web: None,
            speller: None,
            scorer: Scorer::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use `corpus` for lookups and its learned links for gap filling
    pub fn with_corpus(mut self, corpus: Arc<Corpus>) -> Self {
        self.hierarchy = Arc::new(corpus.hierarchy());
        self.corpus = Some(corpus);
        self
    }

    /// Keep the corpus for gap filling and confirmation but stop resolving
    /// terms directly from it
    pub fn with_corpus_lookup(mut self, enabled: bool) -> Self {
        self.corpus_lookup = enabled;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: Arc<Hierarchy>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_web_search(mut self, web: Arc<dyn PageSearch>) -> Self {
        self.web = Some(web);
        self
    }

    /// Look up a corrected spelling for every term before it is searched
    pub fn with_speller(mut self, speller: Arc<dyn SpellChecker>) -> Self {
        self.speller = Some(speller);
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Bound on every adapter and web search call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn adapters(&self) -> &Registry {
        &self.adapters
    }

    /// Resolve `term`, first under its own spelling and then under its
    /// corrected spelling if it has one. On a miss the term is left on its
    /// original, untruncated spelling.
    pub async fn resolve(&self, term: &mut Term, cancel: &CancellationToken) -> Outcome {
        self.check_spelling(term, cancel).await;
        let outcome = self.dispatch(term, cancel, true).await;
        if outcome != Outcome::Missed || term.corrected().is_none() {
            return outcome;
        }

        term.use_corrected();
        debug!(term = %term.display_term(), "Retrying with corrected spelling");
        let outcome = self.dispatch(term, cancel, false).await;
        if outcome != Outcome::Matched {
            term.use_original();
        }
        outcome
    }

    /// Store the spell checker's suggestion on terms that have none yet
    async fn check_spelling(&self, term: &mut Term, cancel: &CancellationToken) {
        let Some(speller) = &self.speller else {
            return;
        };
        if term.corrected().is_some() {
            return;
        }

        let original = percent_decode(term.key());
        let suggestion = tokio::select! {
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(self.timeout, speller.suggest(&original)) => {
                result.unwrap_or_else(|_| {
                    debug!(term = %original, "Spell check timed out");
                    None
                })
            }
        };
        if let Some(corrected) = suggestion {
            debug!(term = %original, corrected = %corrected, "Spelling suggestion");
            term.set_corrected(&species_caps(&corrected));
        }
    }

    async fn dispatch(&self, term: &mut Term, cancel: &CancellationToken, try_corrected: bool) -> Outcome {
        let mut first = true;
        loop {
            if cancel.is_cancelled() {
                term.reset();
                return Outcome::Cancelled;
            }

            if self.search_corpus(term).await {
                return Outcome::Matched;
            }
            if first && try_corrected && self.lookup_corpus().is_some() && term.use_corrected() {
                if self.search_corpus(term).await {
                    return Outcome::Matched;
                }
                term.use_original();
            }
            first = false;

            let Some(candidates) = self.query_adapters(term.search_term(), cancel).await else {
                term.reset();
                return Outcome::Cancelled;
            };
            if self.accept(term, &candidates) {
                return Outcome::Matched;
            }

            if let Some(web) = &self.web {
                let current = term.search_term().to_string();
                let search = tokio::time::timeout(self.timeout, web.candidates(&current));
                let candidates = tokio::select! {
                    _ = cancel.cancelled() => {
                        term.reset();
                        return Outcome::Cancelled;
                    }
                    result = search => result.unwrap_or_else(|_| {
                        debug!(term = %percent_decode(&current), "Web search timed out");
                        CandidateSet::new()
                    }),
                };
                if self.accept(term, &candidates) {
                    return Outcome::Matched;
                }
            }

            if !term.truncate() {
                term.reset();
                return Outcome::Missed;
            }
            debug!(key = term.key(), term = %term.display_term(), "Retrying with shorter term");
        }
    }

    fn lookup_corpus(&self) -> Option<&Arc<Corpus>> {
        self.corpus.as_ref().filter(|_| self.corpus_lookup)
    }

    /// Exact hits are confirmed, fuzzy hits are not
    async fn search_corpus(&self, term: &mut Term) -> bool {
        let Some(corpus) = self.lookup_corpus() else {
            return false;
        };
        let name = term.display_term();
        let hit = match corpus.get(&name) {
            Some(hit) => Some((hit.taxon.clone(), hit.matched.to_string(), hit.exact)),
            None => {
                // The fuzzy scan covers every corpus name; keep it off the async workers
                let corpus = corpus.clone();
                let query = name.clone();
                tokio::task::spawn_blocking(move || {
                    corpus
                        .lookup(&query)
                        .map(|hit| (hit.taxon.clone(), hit.matched.to_string(), hit.exact))
                })
                .await
                .unwrap_or_else(|e| {
                    debug!(term = %name, error = %e, "Fuzzy corpus scan failed");
                    None
                })
            }
        };

        match hit {
            Some((taxon, matched, exact)) => {
                debug!(term = %name, matched = %matched, exact, "Corpus hit");
                term.resolve(taxon, exact);
                true
            }
            None => false,
        }
    }

    /// Query every adapter concurrently. `None` if cancelled first.
    async fn query_adapters(&self, term: &str, cancel: &CancellationToken) -> Option<CandidateSet> {
        let lookups = self.adapters.iter().map(|adapter| async move {
            match tokio::time::timeout(self.timeout, adapter.lookup(term)).await {
                Ok(taxon) => taxon.map(|t| (adapter.name().to_string(), t)),
                Err(_) => {
                    debug!(adapter = adapter.name(), term, "Lookup timed out");
                    None
                }
            }
        });

        tokio::select! {
            _ = cancel.cancelled() => None,
            results = join_all(lookups) => {
                let mut candidates = CandidateSet::new();
                for (name, taxon) in results.into_iter().flatten() {
                    candidates.insert(name, taxon);
                }
                Some(candidates)
            }
        }
    }

    /// Score `candidates` and store the winner on `term`
    fn accept(&self, term: &mut Term, candidates: &CandidateSet) -> bool {
        if candidates.is_empty() {
            return false;
        }
        let Some(consensus) = self.scorer.select(candidates) else {
            return false;
        };

        let unanimous = consensus.is_unanimous();
        let mut taxon = consensus.taxon;
        if !taxon.is_resolved() {
            self.hierarchy.fill_taxonomy(&mut taxon);
        }

        let original = percent_decode(term.key());
        let confirmed = unanimous
            || taxon.species().eq_ignore_ascii_case(&original)
            || self
                .corpus
                .as_ref()
                .is_some_and(|corpus| corpus.get(&original).is_some());

        debug!(
            key = term.key(),
            primary = %consensus.primary,
            candidates = candidates.len(),
            confirmed,
            "Selected taxonomy"
        );
        term.resolve(taxon, confirmed);
        true
    }
}
