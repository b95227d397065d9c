/// NCBI Entrez taxonomy: espell, esearch, then efetch (XML)
use async_trait::async_trait;
use serde::Deserialize;

use tracing::debug;

use super::{accept, SourceAdapter, SpellChecker};
use crate::bio::taxonomy::{Rank, Taxon};
use crate::terms::percent_encode;
use crate::download::{remove_key, HttpFetcher};
use crate::{KestrelError, Result};

#[derive(Debug, Deserialize)]
struct SpellResult {
    #[serde(rename = "CorrectedQuery", default)]
    corrected_query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "IdList", default)]
    id_list: Option<IdList>,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaxaSet {
    #[serde(rename = "Taxon", default)]
    taxa: Vec<TaxonRecord>,
}

#[derive(Debug, Deserialize)]
struct TaxonRecord {
    #[serde(rename = "ScientificName", default)]
    scientific_name: String,
    #[serde(rename = "Rank", default)]
    rank: Option<String>,
    #[serde(rename = "LineageEx", default)]
    lineage: Option<Lineage>,
}

#[derive(Debug, Deserialize)]
struct Lineage {
    #[serde(rename = "Taxon", default)]
    taxa: Vec<TaxonRecord>,
}

fn parse_xml<'de, T: Deserialize<'de>>(xml: &'de str, what: &str) -> Result<T> {
    quick_xml::de::from_str(xml)
        .map_err(|e| KestrelError::Parse(format!("invalid {} XML: {}", what, e)))
}

/// Spelling suggested by espell, if any
pub fn parse_spelling(xml: &str) -> Result<Option<String>> {
    let result: SpellResult = parse_xml(xml, "espell")?;
    Ok(result
        .corrected_query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty()))
}

/// First taxonomy id returned by esearch
pub fn parse_search_id(xml: &str) -> Result<Option<String>> {
    let result: SearchResult = parse_xml(xml, "esearch")?;
    Ok(result
        .id_list
        .and_then(|list| list.ids.into_iter().map(|id| id.trim().to_string()).find(|id| !id.is_empty())))
}

/// Build a taxon from an efetch `TaxaSet` record and its lineage
pub fn parse_taxa_set(xml: &str, source: &str) -> Result<Taxon> {
    let set: TaxaSet = parse_xml(xml, "efetch")?;
    let record = set
        .taxa
        .into_iter()
        .next()
        .ok_or_else(|| KestrelError::Parse("efetch returned no taxa".to_string()))?;

    let mut taxon = Taxon::with_source(source);
    if let Some(rank) = record.rank.as_deref().and_then(|r| Rank::from_label(r, false)) {
        taxon.set_field(rank, &record.scientific_name);
    }
    for ancestor in record.lineage.map(|l| l.taxa).unwrap_or_default() {
        if let Some(rank) = ancestor.rank.as_deref().and_then(|r| Rank::from_label(r, false)) {
            taxon.set_field(rank, &ancestor.scientific_name);
        }
    }
    taxon.finalize();
    Ok(taxon)
}

pub struct NcbiAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    key: String,
}

impl NcbiAdapter {
    pub fn new(fetcher: HttpFetcher, base_url: &str, key: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            key: key.to_string(),
        }
    }

    fn url(&self, tool: &str, param: &str, value: &str) -> String {
        format!(
            "{}{}.fcgi?db=taxonomy&{}={}&api_key={}",
            self.base_url, tool, param, value, self.key
        )
    }

    async fn fetch(&self, term: &str) -> Result<Taxon> {
        let spelling = self.fetcher.get_text(&self.url("espell", "term", term)).await?;
        let query = match parse_spelling(&spelling)? {
            Some(corrected) => corrected.replace(' ', "%20"),
            None => term.to_string(),
        };

        let search = self.fetcher.get_text(&self.url("esearch", "term", &query)).await?;
        let id = parse_search_id(&search)?
            .ok_or_else(|| KestrelError::Parse(format!("no taxonomy id for {}", query)))?;

        let url = format!("{}&retmode=xml", self.url("efetch", "id", &id));
        let record = self.fetcher.get_text(&url).await?;
        parse_taxa_set(&record, &remove_key(&url))
    }
}

#[async_trait]
impl SourceAdapter for NcbiAdapter {
    fn name(&self) -> &str {
        "NCBI"
    }

    async fn lookup(&self, term: &str) -> Option<Taxon> {
        accept(self.name(), term, self.fetch(term).await)
    }
}

#[async_trait]
impl SpellChecker for NcbiAdapter {
    async fn suggest(&self, term: &str) -> Option<String> {
        let url = self.url("espell", "term", &percent_encode(term));
        let result = match self.fetcher.get_text(&url).await {
            Ok(xml) => parse_spelling(&xml),
            Err(e) => Err(e),
        };
        match result {
            Ok(corrected) => corrected.filter(|c| !c.eq_ignore_ascii_case(term)),
            Err(e) => {
                debug!(term, error = %e, "Spell check failed");
                None
            }
        }
    }
}
