/// HTML taxonomy pages: Wikipedia, Wikispecies, ITIS and Animal Diversity Web
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use super::{accept, SourceAdapter};
use crate::bio::taxonomy::{Rank, Taxon};
use crate::download::HttpFetcher;
use crate::terms::term::SPACE;
use crate::Result;

static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));
static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static I: Lazy<Selector> = Lazy::new(|| Selector::parse("i").expect("valid selector"));
static A: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ADW_RANK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul.unstyled li span.rank").expect("valid selector"));

/// Sites whose pages carry a parseable classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageKind {
    Wikipedia,
    Wikispecies,
    Itis,
    AnimalDiversity,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::Wikipedia,
        PageKind::Wikispecies,
        PageKind::Itis,
        PageKind::AnimalDiversity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PageKind::Wikipedia => "WIKI",
            PageKind::Wikispecies => "WIKISPECIES",
            PageKind::Itis => "ITIS",
            PageKind::AnimalDiversity => "ADW",
        }
    }

    pub fn host(&self) -> &'static str {
        match self {
            PageKind::Wikipedia => "en.wikipedia.org",
            PageKind::Wikispecies => "species.wikimedia.org",
            PageKind::Itis => "itis.gov",
            PageKind::AnimalDiversity => "animaldiversity.org",
        }
    }

    /// Recognize a page by its host
    pub fn from_url(url: &str) -> Option<PageKind> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| host == kind.host() || host.ends_with(&format!(".{}", kind.host())))
    }

    pub fn parse(&self, html: &str, source: &str) -> Taxon {
        let document = Html::parse_document(html);
        let mut taxon = Taxon::with_source(source);
        match self {
            PageKind::Wikipedia => scrape_wikipedia(&document, &mut taxon),
            PageKind::Wikispecies => scrape_wikispecies(&document, &mut taxon),
            PageKind::Itis => scrape_itis(&document, &mut taxon),
            PageKind::AnimalDiversity => scrape_adw(&document, &mut taxon),
        }
        taxon.finalize();
        taxon
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().replace('\u{a0}', " ").trim().to_string()
}

/// Element text with `<br>` rendered as a line break
fn lines_of(element: ElementRef) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn next_element(element: ElementRef) -> Option<ElementRef> {
    element.next_siblings().find_map(ElementRef::wrap)
}

fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Infobox rows: a rank label cell followed by a cell with an italic or linked name
fn scrape_wikipedia(document: &Html, taxon: &mut Taxon) {
    for td in document.select(&TD) {
        let Some(rank) = Rank::from_label(&text_of(td), false) else {
            continue;
        };
        if let Some(cell) = next_element(td) {
            if let Some(name) = first_text(cell, &I).or_else(|| first_text(cell, &A)) {
                taxon.set_field(rank, &name);
            }
        }
    }
}

/// Classification paragraphs of `Label: Name` lines with Latin labels
fn scrape_wikispecies(document: &Html, taxon: &mut Taxon) {
    for p in document.select(&P) {
        let text = lines_of(p);
        let first = text.trim_start().split(':').next().unwrap_or_default().trim();
        if first != "Superregnum" && first != "Regnum" && first != "Familia" {
            continue;
        }
        for line in text.lines() {
            if let Some((label, name)) = line.split_once(':') {
                if let Some(rank) = Rank::from_label(label, true) {
                    taxon.set_field(rank, name.trim());
                }
            }
        }
    }
}

/// Hierarchy table: rank cell followed by a cell with the linked name
fn scrape_itis(document: &Html, taxon: &mut Taxon) {
    let mut found = 0;
    for table in document.select(&TABLE) {
        for td in table.select(&TD) {
            let Some(rank) = Rank::from_label(&text_of(td), false) else {
                continue;
            };
            let Some(cell) = next_element(td) else {
                continue;
            };
            let name = match rank {
                Rank::Species => Some(text_of(cell)),
                _ => first_text(cell, &A),
            };
            if let Some(name) = name {
                taxon.set_field(rank, &name);
                found += 1;
            }
        }
        if found >= Rank::ALL.len() {
            break;
        }
    }
}

/// Classification list: `<span class="rank">Kingdom</span> <a>Animalia</a>`
fn scrape_adw(document: &Html, taxon: &mut Taxon) {
    for span in document.select(&ADW_RANK) {
        let label = text_of(span);
        let Some(rank) = label
            .split_whitespace()
            .next()
            .and_then(|word| Rank::from_label(word, false))
        else {
            continue;
        };
        let name = span
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "a")
            .map(text_of);
        if let Some(name) = name.filter(|n| !n.contains(':')) {
            taxon.set_field(rank, &name);
        }
    }
}

/// Fetches `{base}{Title_With_Underscores}` and parses it as `kind`
pub struct PageAdapter {
    fetcher: HttpFetcher,
    kind: PageKind,
    base_url: String,
}

impl PageAdapter {
    pub fn new(fetcher: HttpFetcher, kind: PageKind, base_url: &str) -> Self {
        Self {
            fetcher,
            kind,
            base_url: base_url.to_string(),
        }
    }

    pub fn page_url(&self, term: &str) -> String {
        format!("{}{}", self.base_url, term.replace(SPACE, "_"))
    }

    async fn fetch(&self, term: &str) -> Result<Taxon> {
        let url = self.page_url(term);
        let html = self.fetcher.get_text(&url).await?;
        Ok(self.kind.parse(&html, &url))
    }
}

#[async_trait]
impl SourceAdapter for PageAdapter {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn lookup(&self, term: &str) -> Option<Taxon> {
        accept(self.name(), term, self.fetch(term).await)
    }
}
