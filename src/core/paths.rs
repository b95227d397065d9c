use std::path::PathBuf;
use std::sync::OnceLock;

static KESTREL_HOME: OnceLock<PathBuf> = OnceLock::new();

/// Get the Kestrel home directory
/// Checks KESTREL_HOME environment variable, falls back to ${HOME}/.kestrel
pub fn kestrel_home() -> PathBuf {
    KESTREL_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("KESTREL_HOME") {
                PathBuf::from(path)
            } else {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".kestrel")
            }
        })
        .clone()
}

/// Default location of the user configuration file
pub fn default_config_path() -> PathBuf {
    kestrel_home().join("config.toml")
}

/// Default reference corpus
pub fn default_corpus_path() -> PathBuf {
    kestrel_home().join("corpus.csv.gz")
}
