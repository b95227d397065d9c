/// Split search results into rows whose search term matches the resolved
/// scientific name and rows that need manual curation
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bio::hierarchy::Hierarchy;
use crate::bio::taxonomy::{species_caps, Rank, Taxon};
use crate::utils::files::{read_table, write_table, Table};
use crate::Result;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckStats {
    pub passed: usize,
    pub failed: usize,
    /// Rows taken from the curated file
    pub curated: usize,
    /// Rows with at least one rank filled from the hierarchy
    pub filled: usize,
}

/// `<dir>/<name>.passed.csv` and `<dir>/<name>.failed.csv`, where `name` is
/// the file name of `base` up to its first `.`
pub fn outfile_names(base: &Path) -> (PathBuf, PathBuf) {
    let file_name = base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("results");
    let stem = file_name.split('.').next().filter(|s| !s.is_empty()).unwrap_or("results");
    (
        base.with_file_name(format!("{}.passed.csv", stem)),
        base.with_file_name(format!("{}.failed.csv", stem)),
    )
}

fn rank_columns(table: &Table) -> Result<[usize; 7]> {
    let mut columns = [0usize; 7];
    for rank in Rank::ALL {
        columns[rank.index()] = table.require_column(rank.name())?;
    }
    Ok(columns)
}

fn row_taxon(row: &[String], columns: &[usize; 7]) -> Taxon {
    let values: [&str; 7] = std::array::from_fn(|i| row.get(columns[i]).map(String::as_str).unwrap_or_default());
    Taxon::from_ranks(values, "")
}

/// Curated taxa keyed by search term
fn load_curated(path: &Path) -> Result<HashMap<String, Taxon>> {
    let table = read_table(path)?;
    let term = table.require_column("SearchTerm")?;
    let columns = rank_columns(&table)?;
    let mut curated = HashMap::new();
    for record in &table.rows {
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if let Some(key) = row.get(term).filter(|k| !k.is_empty()) {
            curated.insert(species_caps(key), row_taxon(&row, &columns));
        }
    }
    Ok(curated)
}

/// Case-insensitive match allowing a single edit
fn names_agree(term: &str, species: &str) -> bool {
    strsim::levenshtein(&term.to_lowercase(), &species.to_lowercase()) <= 1
}

/// Check every row of `input`. Rows are filled from a hierarchy learned from
/// the complete rows (plus the curated file, if given) before being written.
pub fn check_results(input: &Path, output: &Path, curated: Option<&Path>) -> Result<CheckStats> {
    let table = read_table(input)?;
    let term_column = table.require_column("SearchTerm")?;
    let columns = rank_columns(&table)?;
    let mut rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.iter().map(str::to_string).collect())
        .collect();

    let curated = match curated {
        Some(path) => load_curated(path)?,
        None => HashMap::new(),
    };

    let mut builder = Hierarchy::builder();
    for taxon in curated.values() {
        builder.add(taxon);
    }
    for row in &rows {
        builder.add(&row_taxon(row, &columns));
    }
    let hierarchy = builder.build();

    let mut stats = CheckStats::default();
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for mut row in rows.drain(..) {
        let term = row.get(term_column).cloned().unwrap_or_default();
        let mut taxon = match curated.get(&species_caps(&term)) {
            Some(taxon) => {
                stats.curated += 1;
                taxon.clone()
            }
            None => row_taxon(&row, &columns),
        };

        if !taxon.is_resolved() {
            let before = taxon.nas();
            hierarchy.fill_taxonomy(&mut taxon);
            if taxon.nas() < before {
                stats.filled += 1;
            }
        }
        for rank in Rank::ALL {
            if let Some(cell) = row.get_mut(columns[rank.index()]) {
                *cell = taxon.get(rank).to_string();
            }
        }

        if curated.contains_key(&species_caps(&term)) || names_agree(&term, taxon.species()) {
            passed.push(row);
        } else {
            failed.push(row);
        }
    }
    stats.passed = passed.len();
    stats.failed = failed.len();

    let header: Vec<&str> = table.headers.iter().collect();
    let (passed_path, failed_path) = outfile_names(output);
    write_table(&passed_path, &header, passed)?;
    write_table(&failed_path, &header, failed)?;

    info!(
        passed = stats.passed,
        failed = stats.failed,
        filled = stats.filled,
        "Checked search results"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "Query,SearchTerm,Kingdom,Phylum,Class,Order,Family,Genus,Species,Source,Confirmed\n";

    #[test]
    fn test_outfile_names() {
        let (passed, failed) = outfile_names(Path::new("/data/results.csv.gz"));
        assert_eq!(passed, PathBuf::from("/data/results.passed.csv"));
        assert_eq!(failed, PathBuf::from("/data/results.failed.csv"));
    }

    #[test]
    fn test_check_splits_and_fills() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("results.csv");
        std::fs::write(
            &input,
            format!(
                "{}{}{}{}",
                HEADER,
                "canis latrans,Canis latrans,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans,a,yes\n",
                "coyote,Coyote,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans,b,yes\n",
                "canis lupus,Canis lupus,NA,NA,Mammalia,Carnivora,Canidae,Canis,Canis lupus,c,no\n",
            ),
        )
        .unwrap();

        let stats = check_results(&input, &input, None).unwrap();
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.filled, 1);

        let (passed, failed) = outfile_names(&input);
        let passed = std::fs::read_to_string(passed).unwrap();
        assert!(passed.contains("canis lupus,Canis lupus,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis lupus,c,no"));
        let failed = std::fs::read_to_string(failed).unwrap();
        assert!(failed.lines().nth(1).unwrap().starts_with("coyote,Coyote,"));
    }

    #[test]
    fn test_curated_rows_pass() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("results.csv");
        let curated = dir.path().join("curated.csv");
        std::fs::write(&input, format!("{}{}", HEADER, "dog,Dog,NA,NA,NA,NA,NA,NA,NA,x,no\n")).unwrap();
        std::fs::write(
            &curated,
            "SearchTerm,Kingdom,Phylum,Class,Order,Family,Genus,Species\n\
             Dog,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis familiaris\n",
        )
        .unwrap();

        let stats = check_results(&input, &input, Some(&curated)).unwrap();
        assert_eq!(stats.curated, 1);
        assert_eq!(stats.passed, 1);
        let (passed, _) = outfile_names(&input);
        assert!(std::fs::read_to_string(passed).unwrap().contains("Canis familiaris"));
    }
}
