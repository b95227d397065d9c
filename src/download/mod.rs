/// Shared HTTP client used by every source adapter
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{KestrelError, Result};

pub const USER_AGENT: &str = concat!("Kestrel/", env!("CARGO_PKG_VERSION"));

/// Query parameters that carry credentials
const KEY_PARAMS: [&str; 4] = ["token", "key", "api_key", "apikey"];

/// Thin wrapper over a pooled reqwest client with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the body. Non-success statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %remove_key(url), "GET");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| KestrelError::Parse(format!("invalid JSON from {}: {}", remove_key(url), e)))
    }
}

/// Strip credential query parameters so a URL can be stored as provenance
pub fn remove_key(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.query().is_none() {
        return url.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !KEY_PARAMS.contains(&name.to_lowercase().as_str()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.to_string()
}
