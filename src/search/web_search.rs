/// Keyword web search over an HTML results page, used when every adapter misses
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::bio::scorer::CandidateSet;
use crate::bio::taxonomy::Taxon;
use crate::download::HttpFetcher;
use crate::sources::PageKind;
use crate::terms::percent_decode;
use crate::Result;

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Anything that can turn a search term into scraped candidate taxa
#[async_trait]
pub trait PageSearch: Send + Sync {
    /// Candidates keyed by page URL. Failures yield an empty set.
    async fn candidates(&self, term: &str) -> CandidateSet;
}

pub struct WebSearch {
    fetcher: HttpFetcher,
    template: String,
}

impl WebSearch {
    /// `template` must contain `{query}`
    pub fn new(fetcher: HttpFetcher, template: &str) -> Self {
        Self {
            fetcher,
            template: template.to_string(),
        }
    }

    pub fn search_url(&self, term: &str) -> String {
        let query = format!("{} taxonomy", percent_decode(term));
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.template.replace("{query}", &encoded)
    }

    async fn results_page(&self, term: &str) -> Result<String> {
        self.fetcher.get_text(&self.search_url(term)).await
    }

    async fn scrape(&self, kind: PageKind, url: String) -> Option<(String, Taxon)> {
        match self.fetcher.get_text(&url).await {
            Ok(html) => {
                let taxon = kind.parse(&html, &url);
                Some((url, taxon))
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to fetch result page");
                None
            }
        }
    }
}

#[async_trait]
impl PageSearch for WebSearch {
    async fn candidates(&self, term: &str) -> CandidateSet {
        let mut candidates = CandidateSet::new();
        let html = match self.results_page(term).await {
            Ok(html) => html,
            Err(e) => {
                debug!(term, error = %e, "Web search failed");
                return candidates;
            }
        };

        let links = result_links(&html);
        debug!(term, links = links.len(), "Scraping web search results");
        let pages = join_all(links.into_iter().map(|(kind, url)| self.scrape(kind, url))).await;
        for (url, taxon) in pages.into_iter().flatten() {
            candidates.insert(url, taxon);
        }
        candidates
    }
}

/// Unwrap redirect links of the form `/l/?uddg=<target>`
fn redirect_target(href: &str) -> String {
    if !href.contains("uddg=") {
        return href.to_string();
    }
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(name, _)| name == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

/// First link to each known taxonomy site on a results page.
///
/// Links with more than one `:` (web caches) or a `(` (disambiguation pages)
/// are skipped and `#fragments` are dropped.
pub fn result_links(html: &str) -> Vec<(PageKind, String)> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&LINK) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = redirect_target(href);
        if href.matches(':').count() > 1 || href.contains('(') {
            continue;
        }
        let href = match href.split_once('#') {
            Some((page, _)) => page.to_string(),
            None => href,
        };
        if let Some(kind) = PageKind::from_url(&href) {
            if seen.insert(kind) {
                links.push((kind, href));
            }
        }
    }
    links
}
