#![allow(dead_code)]

use async_trait::async_trait;
use kestrel::sources::{Registry, SourceAdapter, SpellChecker};
use kestrel::Taxon;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Adapter answering from a fixed table of escaped search terms.
/// Tracks how many lookups were running at once.
pub struct MockAdapter {
    name: String,
    answers: HashMap<String, Taxon>,
    fallback: Option<Taxon>,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: HashMap::new(),
            fallback: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn answer(mut self, term: &str, taxon: Taxon) -> Self {
        self.answers.insert(term.to_string(), taxon);
        self
    }

    /// Answer every term not in the table with `taxon`
    pub fn answer_all(mut self, taxon: Taxon) -> Self {
        self.fallback = Some(taxon);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, term: &str) -> Option<Taxon> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answers.get(term).or(self.fallback.as_ref()).cloned()
    }
}

/// Spell checker with a fixed table of suggestions, keyed by unescaped term
pub struct MockSpeller {
    suggestions: HashMap<String, String>,
}

impl MockSpeller {
    pub fn new(suggestions: &[(&str, &str)]) -> Self {
        Self {
            suggestions: suggestions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SpellChecker for MockSpeller {
    async fn suggest(&self, term: &str) -> Option<String> {
        self.suggestions.get(term).cloned()
    }
}

pub fn registry(adapters: Vec<MockAdapter>) -> Registry {
    adapters
        .into_iter()
        .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
        .collect()
}

/// A finalized taxon from seven rank values
pub fn taxon(values: [&str; 7], source: &str) -> Taxon {
    let mut taxon = Taxon::from_ranks(values, source);
    taxon.finalize();
    taxon
}

pub fn coyote(source: &str) -> Taxon {
    taxon(
        ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis latrans"],
        source,
    )
}

pub const CORPUS_CSV: &str = "\
SearchTerm,Kingdom,Phylum,Class,Order,Family,Genus,Species,Source
Coyote,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans,NCBI
Gray Fox,Animalia,Chordata,Mammalia,Carnivora,Canidae,Urocyon,Urocyon cinereoargenteus,IUCN
,Animalia,Chordata,Aves,Strigiformes,Strigidae,Bubo,Bubo virginianus,EOL
";

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Data lines of a CSV file, header excluded
pub fn data_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}
