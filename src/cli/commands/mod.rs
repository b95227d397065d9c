pub mod check;
pub mod config;
pub mod corpus;
pub mod merge;
pub mod search;

use std::path::Path;
use tracing::debug;

use crate::core::config::{load_config, Config};
use crate::core::paths::default_config_path;

/// Load `path`, or the default config file if it exists, or built-in defaults.
/// API keys from the environment apply in every case.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        debug!(path = %path.display(), "Loading configuration");
        return Ok(load_config(path)?);
    }

    let default = default_config_path();
    if default.exists() {
        debug!(path = %default.display(), "Loading configuration");
        return Ok(load_config(&default)?);
    }

    let mut config = Config::default();
    config.api_keys.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\nmax_in_flight = 8\n").unwrap();

        let config = load_settings(Some(&path)).unwrap();
        assert_eq!(config.search.max_in_flight, 8);
        assert_eq!(config.search.pause_every, 10);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_settings(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
