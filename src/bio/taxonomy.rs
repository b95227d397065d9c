/// Taxonomy records and the normalization rules applied to them
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in every rank that has not been resolved
pub const NA: &str = "NA";

/// The seven taxonomic ranks from kingdom to species
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// All ranks, top-down
    pub const ALL: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    /// All ranks, bottom-up. Gap filling depends on this order.
    pub const BOTTOM_UP: [Rank; 7] = [
        Rank::Species,
        Rank::Genus,
        Rank::Family,
        Rank::Order,
        Rank::Class,
        Rank::Phylum,
        Rank::Kingdom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column/header name
    pub fn name(self) -> &'static str {
        match self {
            Self::Kingdom => "Kingdom",
            Self::Phylum => "Phylum",
            Self::Class => "Class",
            Self::Order => "Order",
            Self::Family => "Family",
            Self::Genus => "Genus",
            Self::Species => "Species",
        }
    }

    /// Next rank up, `None` for kingdom
    pub fn parent(self) -> Option<Rank> {
        match self {
            Self::Kingdom => None,
            other => Some(Self::ALL[other.index() - 1]),
        }
    }

    /// Next rank down, `None` for species
    pub fn child(self) -> Option<Rank> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Parse a rank label scraped from a page, e.g. "Kingdom:" or "Ordo".
    /// Latin labels are only accepted when `translate` is set.
    pub fn from_label(label: &str, translate: bool) -> Option<Rank> {
        let label = label.replace(':', "");
        let label = label.trim().to_lowercase();
        let label = if translate {
            match label.as_str() {
                "regnum" => "kingdom",
                "classis" => "class",
                "ordo" => "order",
                "familia" => "family",
                other => other,
            }
        } else {
            label.as_str()
        };

        match label {
            "kingdom" => Some(Self::Kingdom),
            "phylum" => Some(Self::Phylum),
            "class" => Some(Self::Class),
            "order" => Some(Self::Order),
            "family" => Some(Self::Family),
            "genus" => Some(Self::Genus),
            "species" => Some(Self::Species),
            _ => None,
        }
    }

    /// First rank whose name appears anywhere inside `label`
    pub fn find_in(label: &str) -> Option<Rank> {
        let label = label.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|rank| label.contains(&rank.name().to_lowercase()))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One classification across all seven ranks.
///
/// A taxon starts with every rank set to [`NA`], is filled in rank by rank with
/// [`Taxon::set_field`] while a source response is parsed, and is normalized
/// exactly once by [`Taxon::finalize`]. The NA count is recomputed on every
/// mutation so it can never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxon {
    ranks: [String; 7],
    /// Provenance: a URL or backend tag, empty if synthetic
    pub source: String,
    found: bool,
    nas: usize,
}

impl Default for Taxon {
    fn default() -> Self {
        Self::new()
    }
}

impl Taxon {
    pub fn new() -> Self {
        Self {
            ranks: std::array::from_fn(|_| NA.to_string()),
            source: String::new(),
            found: false,
            nas: Rank::ALL.len(),
        }
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::new()
        }
    }

    /// Build a taxon from kingdom..species values, each run through `set_field`
    pub fn from_ranks(values: [&str; 7], source: impl Into<String>) -> Self {
        let mut taxon = Self::with_source(source);
        for (rank, value) in Rank::ALL.into_iter().zip(values) {
            taxon.set_field(rank, value);
        }
        taxon
    }

    pub fn get(&self, rank: Rank) -> &str {
        &self.ranks[rank.index()]
    }

    pub fn kingdom(&self) -> &str {
        self.get(Rank::Kingdom)
    }

    pub fn phylum(&self) -> &str {
        self.get(Rank::Phylum)
    }

    pub fn class(&self) -> &str {
        self.get(Rank::Class)
    }

    pub fn order(&self) -> &str {
        self.get(Rank::Order)
    }

    pub fn family(&self) -> &str {
        self.get(Rank::Family)
    }

    pub fn genus(&self) -> &str {
        self.get(Rank::Genus)
    }

    pub fn species(&self) -> &str {
        self.get(Rank::Species)
    }

    pub fn is_na(&self, rank: Rank) -> bool {
        is_na(self.get(rank))
    }

    /// Number of ranks still holding the sentinel
    pub fn nas(&self) -> usize {
        self.nas
    }

    pub fn found(&self) -> bool {
        self.found
    }

    /// True once every rank is known
    pub fn is_resolved(&self) -> bool {
        self.nas == 0
    }

    /// Store a scraped value for `rank`.
    ///
    /// The value is trimmed and rejected when it carries a `[` disambiguation
    /// marker, is the sentinel once punctuation is removed (`N/A`, `n.a.`), is
    /// a single character, or has no alphanumeric content. Accepted values are stored verbatim; formatting
    /// happens in [`Taxon::finalize`]. Returns whether the value was stored.
    pub fn set_field(&mut self, rank: Rank, value: &str) -> bool {
        let value = value.trim();
        if value.contains('[')
            || is_na(strip_punctuation(value).trim())
            || value.chars().count() <= 1
            || !value.chars().any(char::is_alphanumeric)
        {
            return false;
        }

        self.ranks[rank.index()] = value.to_string();
        self.recount();
        true
    }

    /// Set `rank` only if it is still unknown. Returns whether it was filled.
    pub(crate) fn fill(&mut self, rank: Rank, value: &str) -> bool {
        if !self.is_na(rank) || is_na(value) || value.is_empty() {
            return false;
        }
        self.ranks[rank.index()] = value.to_string();
        self.recount();
        true
    }

    /// Fill unknown ranks from `other` without overwriting anything known
    pub fn fill_from(&mut self, other: &Taxon) {
        for rank in Rank::ALL {
            self.fill(rank, other.get(rank));
        }
    }

    fn recount(&mut self) {
        self.nas = self.ranks.iter().filter(|value| is_na(value)).count();
    }

    /// Validate and normalize the record.
    ///
    /// `found` becomes true iff at most two ranks are unknown and the genus is
    /// known; only then are the ranks reformatted. Calling this twice gives the
    /// same result as calling it once.
    pub fn finalize(&mut self) {
        self.recount();
        self.found = self.nas <= 2 && !self.is_na(Rank::Genus);
        if !self.found {
            return;
        }

        if self.kingdom().eq_ignore_ascii_case("metazoa") {
            // Zoological name used by NCBI
            self.ranks[Rank::Kingdom.index()] = "Animalia".to_string();
        }

        for rank in &Rank::ALL[..Rank::Species.index()] {
            let formatted = format_level(self.get(*rank));
            self.ranks[rank.index()] = formatted;
        }

        let species = format_species(self.species(), self.genus());
        self.ranks[Rank::Species.index()] = species;

        // Formatting can expose a sentinel hidden behind punctuation
        self.recount();
        self.found = self.nas <= 2 && !self.is_na(Rank::Genus);
    }

    /// Kingdom..Species followed by the source, with quotes stripped
    pub fn to_record(&self) -> Vec<String> {
        self.ranks
            .iter()
            .chain(std::iter::once(&self.source))
            .map(|value| value.replace('"', ""))
            .collect()
    }
}

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_record().join(","))
    }
}

/// Case-insensitive sentinel check
pub fn is_na(value: &str) -> bool {
    value.eq_ignore_ascii_case(NA)
}

/// Upper-case the first character and lower-case the rest
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Capitalize a name as a binomial: genus title-cased, everything after lower-cased
pub fn species_caps(name: &str) -> String {
    let name = name.trim().to_lowercase();
    let mut words = name.split_whitespace();
    match words.next() {
        Some(first) => std::iter::once(title_case(first))
            .chain(words.map(str::to_string))
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

/// Keep only alphanumerics and whitespace
fn strip_punctuation(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Format a single-word rank (kingdom..genus)
fn format_level(value: &str) -> String {
    if is_na(value) {
        return NA.to_string();
    }
    let cleaned = strip_punctuation(value);
    match cleaned.split_whitespace().next() {
        Some(word) => title_case(word),
        None => NA.to_string(),
    }
}

/// Format the species rank as a proper binomial
fn format_species(value: &str, genus: &str) -> String {
    if is_na(value) {
        return NA.to_string();
    }

    // Drop a leading genus abbreviation ("C. lupus")
    let value = match value.split_once('.') {
        Some((_, rest)) if rest.chars().any(char::is_alphanumeric) => rest,
        _ => value,
    };

    let cleaned = strip_punctuation(value);
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    match words.as_slice() {
        [] => NA.to_string(),
        [.., epithet] if words.len() <= 2 && is_na(epithet) => NA.to_string(),
        [epithet] => format!("{} {}", genus, epithet.to_lowercase()),
        [genus_word, epithet, ..] => format!("{} {}", title_case(genus_word), epithet.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coyote() -> Taxon {
        Taxon::from_ranks(
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis latrans"],
            "test",
        )
    }

    #[test]
    fn test_new_taxon_is_all_na() {
        let taxon = Taxon::new();
        assert_eq!(taxon.nas(), 7);
        assert!(!taxon.found());
        assert!(Rank::ALL.iter().all(|rank| taxon.is_na(*rank)));
    }

    #[test]
    fn test_rank_navigation() {
        assert_eq!(Rank::Kingdom.parent(), None);
        assert_eq!(Rank::Phylum.parent(), Some(Rank::Kingdom));
        assert_eq!(Rank::Genus.child(), Some(Rank::Species));
        assert_eq!(Rank::Species.child(), None);
        assert_eq!(Rank::BOTTOM_UP[0], Rank::Species);
    }

    #[test]
    fn test_rank_labels() {
        assert_eq!(Rank::from_label("Kingdom:", false), Some(Rank::Kingdom));
        assert_eq!(Rank::from_label(" order ", false), Some(Rank::Order));
        assert_eq!(Rank::from_label("Ordo", false), None);
        assert_eq!(Rank::from_label("Ordo", true), Some(Rank::Order));
        assert_eq!(Rank::from_label("Familia:", true), Some(Rank::Family));
        assert_eq!(Rank::from_label("Clade:", false), None);
        assert_eq!(Rank::find_in("Kingdom Animalia"), Some(Rank::Kingdom));
        assert_eq!(Rank::find_in("Subclass"), Some(Rank::Class));
    }

    #[test]
    fn test_set_field_rejections() {
        let mut taxon = Taxon::new();
        assert!(!taxon.set_field(Rank::Genus, "Canis [disambiguation]"));
        assert!(!taxon.set_field(Rank::Genus, " na "));
        assert!(!taxon.set_field(Rank::Genus, "C"));
        assert!(!taxon.set_field(Rank::Genus, "--"));
        assert_eq!(taxon.nas(), 7);

        assert!(taxon.set_field(Rank::Genus, "  canis lupus "));
        assert_eq!(taxon.genus(), "canis lupus");
        assert_eq!(taxon.nas(), 6);
    }

    #[test]
    fn test_finalize_formats_ranks() {
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Kingdom, "Metazoa");
        taxon.set_field(Rank::Phylum, "CHORDATA");
        taxon.set_field(Rank::Class, "mammalia (mammals)");
        taxon.set_field(Rank::Order, "Carnivora");
        taxon.set_field(Rank::Family, "Canidae,");
        taxon.set_field(Rank::Genus, "Canis");
        taxon.set_field(Rank::Species, "C. LATRANS");
        taxon.finalize();

        assert!(taxon.found());
        assert_eq!(taxon.kingdom(), "Animalia");
        assert_eq!(taxon.phylum(), "Chordata");
        assert_eq!(taxon.class(), "Mammalia");
        assert_eq!(taxon.family(), "Canidae");
        assert_eq!(taxon.species(), "Canis latrans");
        assert!(taxon.is_resolved());
    }

    #[test]
    fn test_finalize_bare_epithet_gets_genus() {
        let mut taxon = coyote();
        taxon.ranks[Rank::Species.index()] = "latrans".to_string();
        taxon.finalize();
        assert_eq!(taxon.species(), "Canis latrans");
    }

    #[test]
    fn test_finalize_truncates_trinomial() {
        let mut taxon = coyote();
        taxon.ranks[Rank::Species.index()] = "canis lupus familiaris".to_string();
        taxon.finalize();
        assert_eq!(taxon.species(), "Canis lupus");
    }

    #[test]
    fn test_finalize_requires_genus() {
        let mut taxon = coyote();
        taxon.ranks[Rank::Genus.index()] = NA.to_string();
        taxon.finalize();
        assert!(!taxon.found());
    }

    #[test]
    fn test_finalize_requires_two_or_fewer_nas() {
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Kingdom, "Animalia");
        taxon.set_field(Rank::Phylum, "Chordata");
        taxon.set_field(Rank::Class, "Aves");
        taxon.set_field(Rank::Genus, "Gyps");
        taxon.finalize();
        assert_eq!(taxon.nas(), 3);
        assert!(!taxon.found());

        taxon.set_field(Rank::Order, "Accipitriformes");
        taxon.finalize();
        assert_eq!(taxon.nas(), 2);
        assert!(taxon.found());
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let inputs = [
            ["metazoa", "chordata", "aves", "accipitriformes", "accipitridae", "gyps", "G. fulvus"],
            ["Plantae", "NA", "Magnoliopsida", "Rosales", "Rosaceae", "Rosa", "rosa canina var. x"],
            ["Animalia", "Chordata", "Mammalia", "NA", "Canidae", "Canis", "c."],
            ["Fungi", "NA", "NA", "NA", "Amanitaceae", "Amanita", "NA"],
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "N/A", "Canis latrans"],
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "N/A"],
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis n.a."],
        ];
        for values in inputs {
            let mut once = Taxon::from_ranks(values, "src");
            once.finalize();
            let mut twice = once.clone();
            twice.finalize();
            assert_eq!(once, twice, "finalize not idempotent for {:?}", values);
            assert!(!once.found() || !once.is_na(Rank::Genus), "found without genus for {:?}", values);
        }
    }

    #[test]
    fn test_punctuated_sentinels_are_rejected() {
        let mut taxon = Taxon::from_ranks(
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "N/A", "Canis latrans"],
            "src",
        );
        assert!(taxon.is_na(Rank::Genus));
        taxon.finalize();
        assert!(!taxon.found());

        let mut taxon = Taxon::from_ranks(
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "n.a."],
            "src",
        );
        taxon.finalize();
        assert!(taxon.found());
        assert_eq!(taxon.species(), "NA");
        assert_eq!(taxon.nas(), 1);

        let mut taxon = Taxon::from_ranks(
            ["Animalia", "Chordata", "Mammalia", "Carnivora", "Canidae", "Canis", "Canis N/A"],
            "src",
        );
        taxon.finalize();
        assert_eq!(taxon.species(), "NA");
    }

    #[test]
    fn test_fill_never_overwrites() {
        let mut taxon = coyote();
        let mut other = Taxon::new();
        other.set_field(Rank::Family, "Felidae");
        taxon.fill_from(&other);
        assert_eq!(taxon.family(), "Canidae");

        let mut partial = Taxon::new();
        partial.set_field(Rank::Genus, "Canis");
        partial.fill_from(&coyote());
        assert!(partial.is_resolved());
        assert_eq!(partial.genus(), "Canis");
    }

    #[test]
    fn test_species_caps() {
        assert_eq!(species_caps("  CANIS   LATRANS "), "Canis latrans");
        assert_eq!(species_caps("coyote"), "Coyote");
        assert_eq!(species_caps(""), "");
    }

    #[test]
    fn test_record_strips_quotes() {
        let mut taxon = coyote();
        taxon.source = "\"http://example.org\"".to_string();
        let record = taxon.to_record();
        assert_eq!(record.len(), 8);
        assert_eq!(record[7], "http://example.org");
    }
}
