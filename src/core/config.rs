use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bio::corpus::DEFAULT_FUZZY_RATIO;
use crate::bio::scorer::{DEFAULT_CONSENSUS_THRESHOLD, MAX_SCORE};
use crate::core::paths;
use crate::KestrelError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub sources: SourcesConfig,
    pub api_keys: ApiKeys,
    pub web_search: WebSearchConfig,
    pub corpus: CorpusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of terms resolving at once
    pub max_in_flight: usize,
    /// Pause after this many dispatches
    pub pause_every: usize,
    pub pause_millis: u64,
    /// Wait for all in-flight terms after this many dispatches (0 = never)
    pub barrier_every: usize,
    /// Per-request timeout for every source call
    pub request_timeout_secs: u64,
    pub use_corpus: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Pairs must score strictly above this to be accepted
    pub consensus_threshold: i32,
    /// Largest accepted edit distance as a fraction of the query length
    pub fuzzy_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub iucn: bool,
    pub ncbi: bool,
    pub eol: bool,
    pub wikipedia: bool,
    pub wikispecies: bool,
    pub iucn_url: String,
    pub ncbi_url: String,
    pub eol_url: String,
    pub wikipedia_url: String,
    pub wikispecies_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iucn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncbi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    /// Search results page, `{query}` is replaced with the escaped query
    pub url_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Corpus files in priority order; earlier files win
    pub files: Vec<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 200,
            pause_every: 10,
            pause_millis: 1000,
            barrier_every: 200,
            request_timeout_secs: 30,
            use_corpus: true,
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            fuzzy_ratio: DEFAULT_FUZZY_RATIO,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            iucn: true,
            ncbi: true,
            eol: true,
            wikipedia: true,
            wikispecies: true,
            iucn_url: "https://apiv3.iucnredlist.org/api/v3/species/".to_string(),
            ncbi_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/".to_string(),
            eol_url: "https://eol.org/api/".to_string(),
            wikipedia_url: "https://en.wikipedia.org/wiki/".to_string(),
            wikispecies_url: "https://species.wikimedia.org/wiki/".to_string(),
        }
    }
}

impl ApiKeys {
    /// Environment variables override keys from the file
    pub fn apply_env(&mut self) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(key) = read("KESTREL_IUCN_KEY") {
            self.iucn = Some(key);
        }
        if let Some(key) = read("KESTREL_NCBI_KEY") {
            self.ncbi = Some(key);
        }
        if let Some(key) = read("KESTREL_EOL_KEY") {
            self.eol = Some(key);
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url_template: "https://html.duckduckgo.com/html/?q={query}".to_string(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            files: vec![paths::default_corpus_path()],
        }
    }
}

impl Config {
    /// Check values that would otherwise fail at dispatch time
    pub fn validate(&self) -> Result<(), KestrelError> {
        if self.search.max_in_flight == 0 {
            return Err(KestrelError::Config("search.max_in_flight must be at least 1".to_string()));
        }
        // A pair can score at most MAX_SCORE, so higher thresholds disable consensus
        if !(-MAX_SCORE..MAX_SCORE).contains(&self.scoring.consensus_threshold) {
            return Err(KestrelError::Config(format!(
                "scoring.consensus_threshold must be in {}..={}, got {}",
                -MAX_SCORE,
                MAX_SCORE - 1,
                self.scoring.consensus_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.scoring.fuzzy_ratio) {
            return Err(KestrelError::Config(format!(
                "scoring.fuzzy_ratio must be in [0, 1), got {}",
                self.scoring.fuzzy_ratio
            )));
        }
        if self.web_search.enabled && !self.web_search.url_template.contains("{query}") {
            return Err(KestrelError::Config(
                "web_search.url_template must contain {query}".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, KestrelError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&contents)
        .map_err(|e| KestrelError::Config(format!("Failed to parse config: {}", e)))?;
    config.api_keys.apply_env();
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), KestrelError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| KestrelError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.max_in_flight, 200);
        assert_eq!(config.search.pause_every, 10);
        assert_eq!(config.scoring.consensus_threshold, 5);
        assert_eq!(config.scoring.fuzzy_ratio, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kestrel.toml");
        std::fs::write(
            &path,
            "[search]\nmax_in_flight = 8\n\n[corpus]\nfiles = [\"a.csv\", \"b.csv.gz\"]\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.search.max_in_flight, 8);
        assert_eq!(config.search.pause_millis, 1000);
        assert_eq!(config.corpus.files.len(), 2);
        assert!(config.sources.ncbi);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kestrel.toml");
        let mut config = Config::default();
        config.scoring.consensus_threshold = 4;
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.scoring.consensus_threshold, 4);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.search.max_in_flight = 0;
        assert!(matches!(config.validate(), Err(KestrelError::Config(_))));

        let mut config = Config::default();
        config.web_search.enabled = true;
        config.web_search.url_template = "https://search.example.org/".to_string();
        assert!(config.validate().is_err());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[search\n").unwrap();
        assert!(matches!(load_config(&path), Err(KestrelError::Config(_))));
    }

    #[test]
    fn test_consensus_threshold_range() {
        let mut config = Config::default();
        for threshold in [-7, 0, 6] {
            config.scoring.consensus_threshold = threshold;
            assert!(config.validate().is_ok(), "threshold {} rejected", threshold);
        }
        for threshold in [-8, 7, 12] {
            config.scoring.consensus_threshold = threshold;
            assert!(
                matches!(config.validate(), Err(KestrelError::Config(_))),
                "threshold {} accepted",
                threshold
            );
        }
    }
}
