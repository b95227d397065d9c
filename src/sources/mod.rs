/// Taxonomy backends queried for each search term
pub mod eol;
pub mod iucn;
pub mod ncbi;
pub mod pages;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bio::taxonomy::Taxon;
use crate::core::config::Config;
use crate::download::HttpFetcher;
use crate::Result;

pub use eol::EolAdapter;
pub use iucn::IucnAdapter;
pub use ncbi::NcbiAdapter;
pub use pages::{PageAdapter, PageKind};

/// One taxonomy backend.
///
/// `term` is the percent-escaped search term. Any failure, including a
/// response that does not finalize to a found taxon, is reported as `None`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provenance key used when scoring candidates
    fn name(&self) -> &str;

    async fn lookup(&self, term: &str) -> Option<Taxon>;
}

pub type Registry = Vec<Arc<dyn SourceAdapter>>;

/// Suggests a corrected spelling for a search term.
///
/// `term` is unescaped. Returns `None` when the spelling looks right or the
/// backend could not be reached.
#[async_trait]
pub trait SpellChecker: Send + Sync {
    async fn suggest(&self, term: &str) -> Option<String>;
}

/// NCBI espell, when NCBI is enabled and has a key
pub fn build_speller(config: &Config, fetcher: &HttpFetcher) -> Option<Arc<dyn SpellChecker>> {
    if !config.sources.ncbi {
        return None;
    }
    let key = config.api_keys.ncbi.as_ref()?;
    Some(Arc::new(NcbiAdapter::new(fetcher.clone(), &config.sources.ncbi_url, key)))
}

/// Collapse an adapter result into a candidate, logging why it was dropped
pub(crate) fn accept(adapter: &str, term: &str, result: Result<Taxon>) -> Option<Taxon> {
    match result {
        Ok(taxon) if taxon.found() => Some(taxon),
        Ok(_) => {
            debug!(adapter, term, "No usable taxonomy");
            None
        }
        Err(e) => {
            debug!(adapter, term, error = %e, "Lookup failed");
            None
        }
    }
}

/// Build every enabled adapter. Adapters that need an API key are skipped
/// when none is configured.
pub fn build_registry(config: &Config, fetcher: &HttpFetcher) -> Registry {
    let sources = &config.sources;
    let keys = &config.api_keys;
    let mut registry: Registry = Vec::new();

    if sources.iucn {
        match &keys.iucn {
            Some(key) => registry.push(Arc::new(IucnAdapter::new(fetcher.clone(), &sources.iucn_url, key))),
            None => info!("No IUCN key configured, skipping IUCN"),
        }
    }
    if sources.ncbi {
        match &keys.ncbi {
            Some(key) => registry.push(Arc::new(NcbiAdapter::new(fetcher.clone(), &sources.ncbi_url, key))),
            None => info!("No NCBI key configured, skipping NCBI"),
        }
    }
    if sources.eol {
        match &keys.eol {
            Some(key) => registry.push(Arc::new(EolAdapter::new(fetcher.clone(), &sources.eol_url, key))),
            None => info!("No EOL key configured, skipping EOL"),
        }
    }
    if sources.wikipedia {
        registry.push(Arc::new(PageAdapter::new(
            fetcher.clone(),
            PageKind::Wikipedia,
            &sources.wikipedia_url,
        )));
    }
    if sources.wikispecies {
        registry.push(Arc::new(PageAdapter::new(
            fetcher.clone(),
            PageKind::Wikispecies,
            &sources.wikispecies_url,
        )));
    }

    info!(
        adapters = ?registry.iter().map(|a| a.name()).collect::<Vec<_>>(),
        "Configured taxonomy sources"
    );
    registry
}
