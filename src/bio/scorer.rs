/// Cross-source consensus between candidate taxa
use std::collections::BTreeMap;
use tracing::debug;

use super::taxonomy::{is_na, Rank, Taxon};

/// Score of two taxa that agree on every rank
pub const MAX_SCORE: i32 = 7;

/// Pairs must score strictly above this to count as corroborated (6 of 7 ranks)
pub const DEFAULT_CONSENSUS_THRESHOLD: i32 = 5;

/// +1 for a match, -1 for a mismatch, 0 when either side is unknown
pub fn score_level(a: &str, b: &str) -> i32 {
    if is_na(a) || is_na(b) {
        0
    } else if a == b {
        1
    } else {
        -1
    }
}

/// Sum of [`score_level`] over all seven ranks, in -7..=7
pub fn score(a: &Taxon, b: &Taxon) -> i32 {
    Rank::ALL
        .iter()
        .map(|rank| score_level(a.get(*rank), b.get(*rank)))
        .sum()
}

/// Candidate taxa for one term, keyed by provenance.
///
/// Only found candidates with at most two unknown ranks are admitted.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    taxa: BTreeMap<String, Taxon>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `taxon` under `key`. Returns false if it was discarded.
    pub fn insert(&mut self, key: impl Into<String>, taxon: Taxon) -> bool {
        if !taxon.found() || taxon.nas() > 2 {
            return false;
        }
        self.taxa.insert(key.into(), taxon);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Taxon> {
        self.taxa.get(key)
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Taxon)> {
        self.taxa.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The highest scoring pair of candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredPair<'a> {
    pub first: &'a str,
    pub second: &'a str,
    pub score: i32,
}

/// Result of consensus selection
#[derive(Debug, Clone)]
pub struct Consensus {
    pub taxon: Taxon,
    /// Key of the candidate the result was taken from
    pub primary: String,
    /// Key of the corroborating candidate, if a pair was accepted
    pub supporting: Option<String>,
    /// Pair score, if a pair was accepted
    pub score: Option<i32>,
}

impl Consensus {
    /// Both sources agree on every rank
    pub fn is_unanimous(&self) -> bool {
        self.score == Some(MAX_SCORE)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    threshold: i32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_CONSENSUS_THRESHOLD)
    }
}

impl Scorer {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Highest scoring unordered pair, or `None` when the best score does not
    /// exceed the threshold. Ties go to the first pair in key order.
    pub fn best_pair<'a>(&self, candidates: &'a CandidateSet) -> Option<ScoredPair<'a>> {
        let entries: Vec<(&str, &Taxon)> = candidates.iter().collect();
        let mut best: Option<ScoredPair<'a>> = None;

        for (i, (k1, t1)) in entries.iter().enumerate() {
            for (k2, t2) in &entries[i + 1..] {
                let pair_score = score(t1, t2);
                if best.map_or(true, |b| pair_score > b.score) {
                    best = Some(ScoredPair {
                        first: k1,
                        second: k2,
                        score: pair_score,
                    });
                }
            }
        }

        best.filter(|pair| pair.score > self.threshold)
    }

    /// Pick the consensus taxon.
    ///
    /// An accepted pair yields its more complete member with gaps filled from
    /// the other. Otherwise the single candidate with the fewest unknown ranks
    /// is used.
    pub fn select(&self, candidates: &CandidateSet) -> Option<Consensus> {
        if candidates.len() > 1 {
            if let Some(pair) = self.best_pair(candidates) {
                let a = candidates.get(pair.first)?;
                let b = candidates.get(pair.second)?;
                let (primary, secondary, support) = if a.nas() <= b.nas() {
                    (pair.first, b, pair.second)
                } else {
                    (pair.second, a, pair.first)
                };

                let mut taxon = candidates.get(primary)?.clone();
                taxon.fill_from(secondary);
                debug!(primary, support, score = pair.score, "Accepted consensus pair");

                return Some(Consensus {
                    taxon,
                    primary: primary.to_string(),
                    supporting: Some(support.to_string()),
                    score: Some(pair.score),
                });
            }
        }

        // Fewest unknowns, first key on ties
        let mut fallback: Option<(&str, &Taxon)> = None;
        for (key, taxon) in candidates.iter() {
            if fallback.map_or(true, |(_, best)| taxon.nas() < best.nas()) {
                fallback = Some((key, taxon));
            }
        }

        fallback
            .filter(|(_, taxon)| taxon.nas() <= 2)
            .map(|(key, taxon)| Consensus {
                taxon: taxon.clone(),
                primary: key.to_string(),
                supporting: None,
                score: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(values: [&str; 7], source: &str) -> Taxon {
        let mut taxon = Taxon::from_ranks(values, source);
        taxon.finalize();
        taxon
    }

    fn coyote(source: &str) -> Taxon {
        candidate(
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis latrans"],
            source,
        )
    }

    #[test]
    fn test_score_level() {
        let values = ["NA", "Canis", "Vulpes"];
        for a in values {
            for b in values {
                assert_eq!(score_level(a, b), score_level(b, a));
            }
        }
        assert_eq!(score_level("NA", "Canis"), 0);
        assert_eq!(score_level("NA", "NA"), 0);
        assert_eq!(score_level("Canis", "Canis"), 1);
        assert_eq!(score_level("Canis", "Vulpes"), -1);
    }

    #[test]
    fn test_score_range() {
        assert_eq!(score(&coyote("a"), &coyote("b")), MAX_SCORE);
        let fox = candidate(
            ["Plantae", "Tracheophyta", "Magnoliopsida", "Rosales", "Rosaceae", "Rosa", "Rosa canina"],
            "c",
        );
        assert_eq!(score(&coyote("a"), &fox), -MAX_SCORE);
    }

    #[test]
    fn test_candidate_set_filters() {
        let mut set = CandidateSet::new();
        assert!(!set.insert("empty", Taxon::new()));
        let mut sparse = Taxon::new();
        sparse.set_field(Rank::Species, "Canis latrans");
        sparse.finalize();
        assert!(!set.insert("sparse", sparse));
        assert!(set.insert("IUCN", coyote("iucn")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_best_pair_picks_maximum() {
        let mut set = CandidateSet::new();
        set.insert("EOL", coyote("eol"));
        set.insert("IUCN", coyote("iucn"));
        set.insert(
            "WIKI",
            candidate(["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis lupus"], "wiki"),
        );

        let pair = Scorer::default().best_pair(&set).unwrap();
        assert_eq!((pair.first, pair.second, pair.score), ("EOL", "IUCN", 7));
    }

    #[test]
    fn test_best_pair_rejects_at_threshold() {
        // Six of seven ranks agree: 6 - 1 = 5, which is not above the threshold
        let mut set = CandidateSet::new();
        set.insert("IUCN", coyote("iucn"));
        set.insert(
            "NCBI",
            candidate(["Animalia", "Chordata", "Mammalia", "Carnivora", "Felidae", "Canis", "Canis latrans"], "ncbi"),
        );
        assert_eq!(score(set.get("IUCN").unwrap(), set.get("NCBI").unwrap()), 5);
        assert!(Scorer::default().best_pair(&set).is_none());
        assert!(Scorer::new(4).best_pair(&set).is_some());
    }

    #[test]
    fn test_select_pair_fills_primary() {
        let mut set = CandidateSet::new();
        let partial = candidate(["Animalia", "NA", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis latrans"], "ncbi");
        set.insert("NCBI", partial);
        set.insert("IUCN", coyote("iucn"));

        let consensus = Scorer::default().select(&set).unwrap();
        assert_eq!(consensus.primary, "IUCN");
        assert_eq!(consensus.supporting.as_deref(), Some("NCBI"));
        assert_eq!(consensus.score, Some(6));
        assert!(consensus.taxon.is_resolved());
        assert!(!consensus.is_unanimous());
    }

    #[test]
    fn test_select_falls_back_to_fewest_nas() {
        let mut set = CandidateSet::new();
        set.insert(
            "NCBI",
            candidate(["Animalia", "NA", "Mammalia", "Carnivora", "Felidae", "Canis", "Canis latrans"], "ncbi"),
        );
        set.insert("IUCN", coyote("iucn"));

        let consensus = Scorer::default().select(&set).unwrap();
        assert_eq!(consensus.primary, "IUCN");
        assert_eq!(consensus.score, None);
        assert_eq!(consensus.taxon.family(), "Canidae");
    }

    #[test]
    fn test_select_fallback_tie_is_deterministic() {
        let mut set = CandidateSet::new();
        set.insert("WIKI", coyote("wiki"));
        set.insert(
            "EOL",
            candidate(["Plantae", "Tracheophyta", "Magnoliopsida", "Rosales", "Rosaceae", "Rosa", "Rosa canina"], "eol"),
        );
        let consensus = Scorer::default().select(&set).unwrap();
        assert_eq!(consensus.primary, "EOL");
    }

    #[test]
    fn test_disjoint_candidates_score_zero() {
        let mut upper = Taxon::new();
        for rank in &Rank::ALL[..6] {
            upper.set_field(*rank, &format!("{}name", rank.name()));
        }
        upper.finalize();
        let mut lower = Taxon::new();
        lower.set_field(Rank::Species, "Canis latrans");

        assert_eq!(score(&upper, &lower), 0);

        let mut set = CandidateSet::new();
        set.insert("A", upper);
        set.insert("B", lower);
        let consensus = Scorer::default().select(&set).unwrap();
        assert_eq!(consensus.primary, "A");
        assert!(consensus.taxon.is_na(Rank::Species));
    }

    #[test]
    fn test_select_empty() {
        assert!(Scorer::default().select(&CandidateSet::new()).is_none());
    }
}
