/// IUCN Red List species endpoint (JSON)
use async_trait::async_trait;
use serde::Deserialize;

use super::{accept, SourceAdapter};
use crate::bio::taxonomy::{Rank, Taxon};
use crate::download::{remove_key, HttpFetcher};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct IucnResponse {
    #[serde(default)]
    pub result: Vec<IucnSpecies>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IucnSpecies {
    pub scientific_name: String,
    pub kingdom: String,
    pub phylum: String,
    pub class: String,
    pub order: String,
    pub family: String,
    pub genus: String,
}

impl IucnSpecies {
    fn to_taxon(&self, source: &str) -> Taxon {
        let mut taxon = Taxon::with_source(source);
        for (rank, value) in [
            (Rank::Kingdom, &self.kingdom),
            (Rank::Phylum, &self.phylum),
            (Rank::Class, &self.class),
            (Rank::Order, &self.order),
            (Rank::Family, &self.family),
            (Rank::Genus, &self.genus),
            (Rank::Species, &self.scientific_name),
        ] {
            taxon.set_field(rank, value);
        }
        taxon.finalize();
        taxon
    }
}

/// First result that finalizes to a found taxon
pub fn parse_iucn(response: &IucnResponse, source: &str) -> Taxon {
    response
        .result
        .iter()
        .map(|species| species.to_taxon(source))
        .find(Taxon::found)
        .unwrap_or_else(|| Taxon::with_source(source))
}

pub struct IucnAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    key: String,
}

impl IucnAdapter {
    pub fn new(fetcher: HttpFetcher, base_url: &str, key: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            key: key.to_string(),
        }
    }

    async fn fetch(&self, term: &str) -> Result<Taxon> {
        let url = format!("{}{}?token={}", self.base_url, term, self.key);
        let response: IucnResponse = self.fetcher.get_json(&url).await?;
        Ok(parse_iucn(&response, &remove_key(&url)))
    }
}

#[async_trait]
impl SourceAdapter for IucnAdapter {
    fn name(&self) -> &str {
        "IUCN"
    }

    async fn lookup(&self, term: &str) -> Option<Taxon> {
        accept(self.name(), term, self.fetch(term).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "name": "coyote",
        "result": [{
            "taxonid": 3745,
            "scientific_name": "Canis latrans",
            "kingdom": "ANIMALIA",
            "phylum": "CHORDATA",
            "class": "MAMMALIA",
            "order": "CARNIVORA",
            "family": "CANIDAE",
            "genus": "Canis",
            "main_common_name": "Coyote"
        }]
    }"#;

    #[test]
    fn test_parse_iucn() {
        let response: IucnResponse = serde_json::from_str(RESPONSE).unwrap();
        let taxon = parse_iucn(&response, "https://api.example.org/species/coyote");
        assert!(taxon.found());
        assert!(taxon.is_resolved());
        assert_eq!(taxon.class(), "Mammalia");
        assert_eq!(taxon.species(), "Canis latrans");
        assert_eq!(taxon.source, "https://api.example.org/species/coyote");
    }

    #[test]
    fn test_parse_iucn_empty() {
        let response: IucnResponse = serde_json::from_str(r#"{"name": "x", "result": []}"#).unwrap();
        assert!(!parse_iucn(&response, "src").found());
    }
}
