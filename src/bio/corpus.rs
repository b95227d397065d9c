/// Reference corpus of resolved taxa and their common names
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::hierarchy::Hierarchy;
use super::taxonomy::{species_caps, Rank, Taxon};
use crate::utils::files::{read_table, write_table, Table};
use crate::{KestrelError, Result};

/// Default maximum edit distance as a fraction of the query length
pub const DEFAULT_FUZZY_RATIO: f64 = 0.1;

/// Header of persisted corpus files
pub const CORPUS_HEADER: [&str; 9] = [
    "SearchTerm",
    "Kingdom",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "Genus",
    "Species",
    "Source",
];

/// Build phase for a [`Corpus`]. Earlier records win over later ones.
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    taxa: HashMap<String, Taxon>,
    aliases: HashMap<String, String>,
    skipped: usize,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finalized, complete taxon and an optional common name for it.
    /// Returns false if the taxon was incomplete and skipped.
    pub fn add(&mut self, common: Option<&str>, taxon: Taxon) -> bool {
        if !taxon.is_resolved() {
            self.skipped += 1;
            return false;
        }

        let species = species_caps(taxon.species());
        if let Some(common) = common.map(species_caps).filter(|c| !c.is_empty()) {
            self.aliases.entry(common).or_insert_with(|| species.clone());
        }
        self.taxa.entry(species).or_insert(taxon);
        true
    }

    /// Read one persisted corpus file (CSV, optionally gzipped)
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let table = read_table(path)
            .map_err(|e| KestrelError::Corpus(format!("{}: {}", path.display(), e)))?;
        let columns = CorpusColumns::locate(&table)
            .map_err(|e| KestrelError::Corpus(format!("{}: {}", path.display(), e)))?;

        let mut added = 0;
        for row in &table.rows {
            let (common, mut taxon) = columns.parse(row);
            taxon.finalize();
            if self.add(common.as_deref(), taxon) {
                added += 1;
            }
        }

        debug!(path = %path.display(), added, "Read corpus file");
        Ok(added)
    }

    pub fn build(self, fuzzy_ratio: f64) -> Corpus {
        if self.skipped > 0 {
            debug!(skipped = self.skipped, "Skipped incomplete corpus rows");
        }

        let mut names: Vec<String> = self
            .taxa
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        let lowered = names.iter().map(|n| n.to_lowercase()).collect();

        Corpus {
            taxa: self.taxa,
            aliases: self.aliases,
            names,
            lowered,
            fuzzy_ratio,
        }
    }
}

/// Column positions of a corpus table
struct CorpusColumns {
    common: Option<usize>,
    ranks: [usize; 7],
    source: Option<usize>,
}

impl CorpusColumns {
    fn locate(table: &Table) -> Result<Self> {
        let mut ranks = [0; 7];
        for rank in Rank::ALL {
            ranks[rank.index()] = table.require_column(rank.name())?;
        }
        Ok(Self {
            common: table.column("SearchTerm"),
            ranks,
            source: table.column("Source"),
        })
    }

    fn parse(&self, row: &csv::StringRecord) -> (Option<String>, Taxon) {
        let field = |idx: usize| row.get(idx).unwrap_or_default();
        let values: [&str; 7] = std::array::from_fn(|i| field(self.ranks[i]));
        let source = self.source.map(field).unwrap_or_default();
        let common = self
            .common
            .map(field)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        (common, Taxon::from_ranks(values, source))
    }
}

/// A corpus match
#[derive(Debug, Clone, Copy)]
pub struct CorpusHit<'a> {
    pub taxon: &'a Taxon,
    /// The corpus name that matched
    pub matched: &'a str,
    /// True for exact species or alias hits, false for fuzzy ones
    pub exact: bool,
}

/// Immutable corpus snapshot, shared read-only by all workers
#[derive(Debug, Clone)]
pub struct Corpus {
    taxa: HashMap<String, Taxon>,
    aliases: HashMap<String, String>,
    names: Vec<String>,
    lowered: Vec<String>,
    fuzzy_ratio: f64,
}

impl Default for Corpus {
    fn default() -> Self {
        CorpusBuilder::new().build(DEFAULT_FUZZY_RATIO)
    }
}

impl Corpus {
    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::new()
    }

    /// Load corpus files in priority order. Fails if any file is unreadable
    /// or if no complete taxa were found at all.
    pub fn load<P: AsRef<Path>>(paths: &[P], fuzzy_ratio: f64) -> Result<Self> {
        if paths.is_empty() {
            return Err(KestrelError::Corpus("no corpus files configured".to_string()));
        }

        let mut builder = CorpusBuilder::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(KestrelError::Corpus(format!(
                    "corpus file not found: {}",
                    path.display()
                )));
            }
            builder.add_file(path)?;
        }

        let corpus = builder.build(fuzzy_ratio);
        if corpus.is_empty() {
            return Err(KestrelError::Corpus(
                "corpus contains no complete taxa".to_string(),
            ));
        }

        info!(
            taxa = corpus.len(),
            aliases = corpus.aliases.len(),
            "Loaded reference corpus"
        );
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    pub fn taxa(&self) -> impl Iterator<Item = &Taxon> {
        self.taxa.values()
    }

    /// Build the gap-filling hierarchy from every corpus taxon
    pub fn hierarchy(&self) -> Hierarchy {
        // Sorted so first-writer-wins is reproducible across runs
        let ordered: BTreeMap<&String, &Taxon> = self.taxa.iter().collect();
        Hierarchy::from_taxa(ordered.into_values())
    }

    /// Exact match on a species or common name
    pub fn get(&self, name: &str) -> Option<CorpusHit<'_>> {
        let key = species_caps(name);
        if let Some((matched, taxon)) = self.taxa.get_key_value(&key) {
            return Some(CorpusHit {
                taxon,
                matched,
                exact: true,
            });
        }

        let (matched, species) = self.aliases.get_key_value(&key)?;
        self.taxa.get(species).map(|taxon| CorpusHit {
            taxon,
            matched,
            exact: true,
        })
    }

    /// Exact lookup, then the closest known name by edit distance.
    ///
    /// A fuzzy match is accepted only when its distance is at most
    /// `floor(len * fuzzy_ratio)`, so names shorter than ten characters
    /// must match exactly. Ties go to the alphabetically first name.
    pub fn lookup(&self, name: &str) -> Option<CorpusHit<'_>> {
        if let Some(hit) = self.get(name) {
            return Some(hit);
        }

        let query = species_caps(name).to_lowercase();
        if query.is_empty() || self.names.is_empty() {
            return None;
        }
        let limit = (query.chars().count() as f64 * self.fuzzy_ratio).floor() as usize;
        if limit == 0 {
            return None;
        }

        let (distance, idx) = self
            .lowered
            .par_iter()
            .enumerate()
            .map(|(idx, known)| (strsim::levenshtein(&query, known), idx))
            .min()?;

        if distance > limit {
            return None;
        }

        let matched = &self.names[idx];
        debug!(query = name, matched = %matched, distance, "Fuzzy corpus match");
        self.get(matched).map(|hit| CorpusHit { exact: false, ..hit })
    }
}

/// Counts from [`format_corpus`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatStats {
    pub read: usize,
    pub written: usize,
    pub incomplete: usize,
}

/// Normalize a raw corpus file and write its complete taxa to `output`.
///
/// Every row is finalized, then gaps are filled from the hierarchy twice so
/// ranks recovered in the first pass can seed the second. Rows with a common
/// name are written first.
pub fn format_corpus(input: &Path, output: &Path) -> Result<FormatStats> {
    let table = read_table(input)?;
    let columns = CorpusColumns::locate(&table)?;
    let mut stats = FormatStats::default();

    let mut taxa: BTreeMap<String, Taxon> = BTreeMap::new();
    let mut common: BTreeMap<String, String> = BTreeMap::new();
    for row in &table.rows {
        let (name, mut taxon) = columns.parse(row);
        taxon.finalize();
        stats.read += 1;

        let species = species_caps(taxon.species());
        if species.is_empty() || taxon.is_na(Rank::Species) {
            stats.incomplete += 1;
            continue;
        }
        if let Some(name) = name.map(|n| species_caps(&n)).filter(|n| !n.is_empty()) {
            common.entry(name).or_insert_with(|| species.clone());
        }
        taxa.entry(species).or_insert(taxon);
    }

    for _ in 0..2 {
        let hierarchy = Hierarchy::from_taxa(taxa.values());
        for taxon in taxa.values_mut() {
            hierarchy.fill_taxonomy(taxon);
        }
    }
    for taxon in taxa.values_mut().filter(|t| t.is_resolved()) {
        taxon.finalize();
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut named: HashSet<&str> = HashSet::new();
    for (name, species) in &common {
        if let Some(taxon) = taxa.get(species).filter(|t| t.is_resolved()) {
            rows.push(corpus_row(name, taxon));
            named.insert(species.as_str());
        }
    }
    for (species, taxon) in &taxa {
        if !taxon.is_resolved() {
            stats.incomplete += 1;
        } else if !named.contains(species.as_str()) {
            rows.push(corpus_row("", taxon));
        }
    }

    if rows.is_empty() {
        warn!(input = %input.display(), "No complete taxa to write");
    }
    stats.written = rows.len();
    write_table(output, &CORPUS_HEADER, rows)?;
    info!(output = %output.display(), written = stats.written, "Wrote formatted corpus");
    Ok(stats)
}

fn corpus_row(common: &str, taxon: &Taxon) -> Vec<String> {
    std::iter::once(common.replace('"', ""))
        .chain(taxon.to_record())
        .collect()
}
