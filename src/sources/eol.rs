/// Encyclopedia of Life: search and pages (XML), then hierarchy entries (JSON)
use async_trait::async_trait;
use serde::Deserialize;

use super::{accept, SourceAdapter};
use crate::bio::taxonomy::{Rank, Taxon};
use crate::download::{remove_key, HttpFetcher};
use crate::terms::percent_decode;
use crate::{KestrelError, Result};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "result", alias = "entry", default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    id: String,
    title: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(rename = "taxonConcept", default)]
    concepts: Vec<TaxonConcept>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaxonConcept {
    identifier: String,
    #[serde(rename = "taxonRank")]
    taxon_rank: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HierarchyEntry {
    pub entry: CanonicalEntry,
    pub ancestors: Vec<Ancestor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CanonicalEntry {
    pub canonical_form: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ancestor {
    #[serde(rename = "scientificName")]
    pub scientific_name: String,
    #[serde(rename = "taxonRank")]
    pub taxon_rank: String,
}

fn is_numeric(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// Case-insensitive subsequence match
fn fuzzy_contains(needle: &str, haystack: &str) -> bool {
    let mut haystack = haystack.chars().flat_map(char::to_lowercase);
    needle
        .chars()
        .flat_map(char::to_lowercase)
        .all(|c| haystack.any(|h| h == c))
}

/// Pick the search result for `query`: a title that fuzzily contains the
/// query wins outright, otherwise the result whose content has the closest
/// entry by edit distance.
pub fn parse_search(xml: &str, query: &str) -> Result<Option<String>> {
    let response: SearchResponse = quick_xml::de::from_str(xml)
        .map_err(|e| KestrelError::Parse(format!("invalid EOL search XML: {}", e)))?;

    let mut best: Option<(usize, String)> = None;
    for result in response.results {
        let id = result.id.trim();
        if !is_numeric(id) {
            continue;
        }
        if fuzzy_contains(query, &result.title) {
            return Ok(Some(id.to_string()));
        }
        for entry in result.content.split(';').map(str::trim) {
            let distance = strsim::levenshtein(query, entry);
            if distance == 0 {
                return Ok(Some(id.to_string()));
            }
            let limit = best.as_ref().map_or(query.len(), |(d, _)| *d);
            if distance < limit {
                best = Some((distance, id.to_string()));
            }
        }
    }
    Ok(best.map(|(_, id)| id))
}

/// Identifier of the first species-rank concept on a page
pub fn parse_pages(xml: &str) -> Result<Option<String>> {
    let response: PagesResponse = quick_xml::de::from_str(xml)
        .map_err(|e| KestrelError::Parse(format!("invalid EOL pages XML: {}", e)))?;
    Ok(response
        .concepts
        .into_iter()
        .filter(|c| c.taxon_rank.trim().eq_ignore_ascii_case("species"))
        .map(|c| c.identifier.trim().to_string())
        .find(|id| is_numeric(id)))
}

pub fn parse_hierarchy(entry: &HierarchyEntry, source: &str) -> Taxon {
    let mut taxon = Taxon::with_source(source);
    taxon.set_field(Rank::Species, &entry.entry.canonical_form);
    for ancestor in &entry.ancestors {
        if let Some(rank) = Rank::from_label(&ancestor.taxon_rank, false) {
            taxon.set_field(rank, &ancestor.scientific_name);
        }
    }
    taxon.finalize();
    taxon
}

pub struct EolAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    key: String,
}

impl EolAdapter {
    pub fn new(fetcher: HttpFetcher, base_url: &str, key: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            key: key.to_string(),
        }
    }

    fn url(&self, api: &str, format: &str, param: &str, value: &str) -> String {
        format!(
            "{}{}/1.0.{}?{}={}&vetted=1&key={}",
            self.base_url, api, format, param, value, self.key
        )
    }

    async fn fetch(&self, term: &str) -> Result<Taxon> {
        let search = self.fetcher.get_text(&self.url("search", "xml", "q", term)).await?;
        let taxon_id = parse_search(&search, &percent_decode(term))?
            .ok_or_else(|| KestrelError::Parse(format!("no EOL result for {}", term)))?;

        let pages = self.fetcher.get_text(&self.url("pages", "xml", "id", &taxon_id)).await?;
        let entry_id = parse_pages(&pages)?
            .ok_or_else(|| KestrelError::Parse(format!("no species concept for EOL page {}", taxon_id)))?;

        let url = self.url("hierarchy_entries", "json", "id", &entry_id);
        let entry: HierarchyEntry = self.fetcher.get_json(&url).await?;
        Ok(parse_hierarchy(&entry, &remove_key(&url)))
    }
}

#[async_trait]
impl SourceAdapter for EolAdapter {
    fn name(&self) -> &str {
        "EOL"
    }

    async fn lookup(&self, term: &str) -> Option<Taxon> {
        accept(self.name(), term, self.fetch(term).await)
    }
}
