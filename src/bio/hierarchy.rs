/// Learned parent links between rank names, used to fill gaps in partial taxa
use std::collections::HashMap;
use tracing::debug;

use super::taxonomy::{is_na, Rank, Taxon};

/// Mutable build phase for a [`Hierarchy`].
///
/// Folds complete taxa into one child -> parent map per rank transition. The
/// first record to claim a child name wins; later records never overwrite it.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    parents: [HashMap<String, String>; 6],
    species_of_genus: HashMap<String, Option<String>>,
    added: usize,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn every link from a complete taxon. Incomplete taxa are ignored.
    pub fn add(&mut self, taxon: &Taxon) -> bool {
        if !taxon.is_resolved() {
            return false;
        }

        for rank in &Rank::ALL[1..] {
            let parent = rank.parent().map(|p| taxon.get(p)).unwrap_or_default();
            self.parents[map_index(*rank)]
                .entry(taxon.get(*rank).to_string())
                .or_insert_with(|| parent.to_string());
        }

        // A genus only implies its species when it is monotypic
        match self.species_of_genus.get_mut(taxon.genus()) {
            Some(entry) => {
                if entry.as_deref() != Some(taxon.species()) {
                    *entry = None;
                }
            }
            None => {
                self.species_of_genus
                    .insert(taxon.genus().to_string(), Some(taxon.species().to_string()));
            }
        }

        self.added += 1;
        true
    }

    pub fn extend<'a>(mut self, taxa: impl IntoIterator<Item = &'a Taxon>) -> Self {
        for taxon in taxa {
            self.add(taxon);
        }
        self
    }

    /// Freeze the maps into an immutable snapshot
    pub fn build(self) -> Hierarchy {
        debug!(taxa = self.added, "Built taxonomy hierarchy");
        Hierarchy {
            parents: self.parents,
            species_of_genus: self
                .species_of_genus
                .into_iter()
                .filter_map(|(genus, species)| species.map(|s| (genus, s)))
                .collect(),
        }
    }
}

/// Immutable parent maps, safe to share across dispatch workers
#[derive(Debug, Default, Clone)]
pub struct Hierarchy {
    parents: [HashMap<String, String>; 6],
    species_of_genus: HashMap<String, String>,
}

/// Maps are indexed by child rank, phylum..species
fn map_index(child: Rank) -> usize {
    child.index() - 1
}

impl Hierarchy {
    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::new()
    }

    pub fn from_taxa<'a>(taxa: impl IntoIterator<Item = &'a Taxon>) -> Self {
        HierarchyBuilder::new().extend(taxa).build()
    }

    /// Parent name of `name` at rank `child`, e.g. the family of a genus
    pub fn parent_of(&self, child: Rank, name: &str) -> Option<&str> {
        if child == Rank::Kingdom {
            return None;
        }
        self.parents[map_index(child)].get(name).map(String::as_str)
    }

    /// The only species known for a monotypic genus
    pub fn species_of(&self, genus: &str) -> Option<&str> {
        self.species_of_genus.get(genus).map(String::as_str)
    }

    /// Number of distinct names learned at `rank`
    pub fn len_at(&self, rank: Rank) -> usize {
        match rank {
            Rank::Kingdom => 0,
            other => self.parents[map_index(other)].len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parents.iter().all(HashMap::is_empty)
    }

    /// Fill unknown ranks of `taxon` from learned links, bottom-up.
    ///
    /// Each rank is looked up by the value of the rank directly below it, which
    /// may itself have just been filled. Known ranks are never changed and
    /// nothing is invented when a link is missing. Returns whether the taxon is
    /// complete afterwards.
    pub fn fill_taxonomy(&self, taxon: &mut Taxon) -> bool {
        for rank in Rank::BOTTOM_UP {
            if !taxon.is_na(rank) {
                continue;
            }

            let learned = match rank {
                Rank::Species => self.species_of(taxon.genus()),
                _ => rank.child().and_then(|child| {
                    let key = taxon.get(child);
                    if is_na(key) {
                        None
                    } else {
                        self.parent_of(child, key)
                    }
                }),
            };

            if let Some(value) = learned {
                taxon.fill(rank, value);
            }
        }

        taxon.is_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Vec<Taxon> {
        vec![
            Taxon::from_ranks(
                ["Animalia", "Chordata", "Reptilia", "Squamata", "Anguidae", "Abronia", "Abronia graminea"],
                "",
            ),
            Taxon::from_ranks(
                ["Animalia", "Chordata", "Reptilia", "Squamata", "Helodermatidae", "Heloderma", "Heloderma suspectum"],
                "",
            ),
            Taxon::from_ranks(
                ["Animalia", "Arthropoda", "Insecta", "Orthoptera", "Gryllidae", "Acheta", "Acheta domesticus"],
                "",
            ),
            Taxon::from_ranks(
                ["Animalia", "Chordata", "Aves", "Passeriformes", "Sturnidae", "Acridotheres", "Acridotheres tristis"],
                "",
            ),
            Taxon::from_ranks(
                ["Animalia", "Chordata", "Aves", "Passeriformes", "Sturnidae", "Acridotheres", "Acridotheres cristatellus"],
                "",
            ),
        ]
    }

    #[test]
    fn test_hierarchy_links() {
        let taxa = reference();
        let hierarchy = Hierarchy::from_taxa(&taxa);
        for taxon in &taxa {
            for rank in &Rank::ALL[1..] {
                let parent = rank.parent().map(|p| taxon.get(p));
                assert_eq!(hierarchy.parent_of(*rank, taxon.get(*rank)), parent);
            }
        }
        assert_eq!(hierarchy.len_at(Rank::Class), 3);
    }

    #[test]
    fn test_first_writer_wins() {
        let first = Taxon::from_ranks(["Animalia", "Chordata", "Aves", "Passeriformes", "Sturnidae", "Sturnus", "Sturnus vulgaris"], "");
        let second = Taxon::from_ranks(["Animalia", "Chordata", "Aves", "Passeriformes", "Muscicapidae", "Sturnus", "Sturnus unicolor"], "");
        let hierarchy = Hierarchy::from_taxa([&first, &second]);
        assert_eq!(hierarchy.parent_of(Rank::Genus, "Sturnus"), Some("Sturnidae"));
    }

    #[test]
    fn test_incomplete_taxa_are_not_learned() {
        let partial = Taxon::from_ranks(["Animalia", "NA", "Aves", "NA", "Sturnidae", "Sturnus", "NA"], "");
        let mut builder = Hierarchy::builder();
        assert!(!builder.add(&partial));
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_fill_taxonomy_from_genus() {
        let hierarchy = Hierarchy::from_taxa(&reference());
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Genus, "Heloderma");
        taxon.set_field(Rank::Species, "Heloderma horridum");

        assert!(hierarchy.fill_taxonomy(&mut taxon));
        assert_eq!(taxon.family(), "Helodermatidae");
        assert_eq!(taxon.kingdom(), "Animalia");
        assert_eq!(taxon.species(), "Heloderma horridum");
    }

    #[test]
    fn test_fill_taxonomy_from_species_only() {
        let hierarchy = Hierarchy::from_taxa(&reference());
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Species, "Acheta domesticus");
        assert!(hierarchy.fill_taxonomy(&mut taxon));
        assert_eq!(taxon.phylum(), "Arthropoda");
    }

    #[test]
    fn test_fill_taxonomy_never_overwrites() {
        let hierarchy = Hierarchy::from_taxa(&reference());
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Family, "Custom");
        taxon.set_field(Rank::Genus, "Abronia");
        hierarchy.fill_taxonomy(&mut taxon);
        assert_eq!(taxon.family(), "Custom");
        // Order is looked up by the existing family, which is unknown
        assert!(taxon.is_na(Rank::Order));
    }

    #[test]
    fn test_fill_species_only_for_monotypic_genus() {
        let hierarchy = Hierarchy::from_taxa(&reference());

        let mut lizard = Taxon::new();
        lizard.set_field(Rank::Genus, "Abronia");
        assert!(hierarchy.fill_taxonomy(&mut lizard));
        assert_eq!(lizard.species(), "Abronia graminea");

        let mut myna = Taxon::new();
        myna.set_field(Rank::Genus, "Acridotheres");
        assert!(!hierarchy.fill_taxonomy(&mut myna));
        assert!(myna.is_na(Rank::Species));
        assert_eq!(myna.nas(), 1);
    }

    #[test]
    fn test_fill_leaves_unknown_links() {
        let hierarchy = Hierarchy::from_taxa(&reference());
        let mut taxon = Taxon::new();
        taxon.set_field(Rank::Genus, "Unknownia");
        assert!(!hierarchy.fill_taxonomy(&mut taxon));
        assert_eq!(taxon.nas(), 6);
    }
}
