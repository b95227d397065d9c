/// Join search results back onto the table the queries came from
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::bio::taxonomy::{is_na, Rank, NA};
use crate::utils::files::{read_table, write_table};
use crate::{KestrelError, Result};

/// Rank columns appended by `merge`. Species is written as the scientific name.
pub const MERGED_COLUMNS: [&str; 7] = [
    "Kingdom",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "Genus",
    "ScientificName",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Column of the input holding the original query
    pub column: usize,
    /// Put the taxonomy before the input columns instead of after
    pub prepend: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub rows: usize,
    pub matched: usize,
}

type Ranks = [String; 7];

/// Results indexed by query and by scientific name
pub fn load_results(path: &Path) -> Result<HashMap<String, Ranks>> {
    let table = read_table(path)?;
    let query = table.require_column("Query")?;
    let mut columns = [0usize; 7];
    for rank in Rank::ALL {
        columns[rank.index()] = table.require_column(rank.name())?;
    }

    let mut taxa = HashMap::new();
    for row in &table.rows {
        let ranks: Ranks = std::array::from_fn(|i| row.get(columns[i]).unwrap_or(NA).to_string());
        let species = ranks[Rank::Species.index()].clone();
        if let Some(q) = row.get(query).filter(|q| !q.is_empty()) {
            taxa.insert(q.to_string(), ranks.clone());
        }
        if !species.is_empty() && !is_na(&species) {
            taxa.entry(species).or_insert(ranks);
        }
    }
    info!(entries = taxa.len(), path = %path.display(), "Loaded search results");
    Ok(taxa)
}

/// Write `input` with seven rank columns added to `output`. Rows whose query
/// has no result get `NA` in every rank.
pub fn merge_results(input: &Path, results: &Path, output: &Path, options: MergeOptions) -> Result<MergeStats> {
    let taxa = load_results(results)?;
    let table = read_table(input)?;
    if options.column >= table.headers.len() {
        return Err(KestrelError::Parse(format!(
            "column {} is out of range for {} ({} columns)",
            options.column,
            input.display(),
            table.headers.len()
        )));
    }

    let nas: Ranks = std::array::from_fn(|_| NA.to_string());
    let mut stats = MergeStats::default();
    let mut rows = Vec::with_capacity(table.rows.len());
    for record in &table.rows {
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        let ranks = match record.get(options.column).and_then(|q| taxa.get(q)) {
            Some(ranks) => {
                stats.matched += 1;
                ranks
            }
            None => &nas,
        };
        rows.push(join(fields, ranks.to_vec(), options.prepend));
        stats.rows += 1;
    }

    let input_header: Vec<String> = table.headers.iter().map(str::to_string).collect();
    let rank_header: Vec<String> = MERGED_COLUMNS.iter().map(|c| c.to_string()).collect();
    let header = join(input_header, rank_header, options.prepend);
    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    write_table(output, &header, rows)?;

    info!(rows = stats.rows, matched = stats.matched, output = %output.display(), "Merged results");
    Ok(stats)
}

fn join(fields: Vec<String>, ranks: Vec<String>, prepend: bool) -> Vec<String> {
    if prepend {
        ranks.into_iter().chain(fields).collect()
    } else {
        fields.into_iter().chain(ranks).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RESULTS: &str = "Query,SearchTerm,Kingdom,Phylum,Class,Order,Family,Genus,Species,Source,Confirmed\n\
        coyote,Coyote,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans,corpus,yes\n";

    fn setup(input: &str) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let input_path = dir.path().join("input.csv");
        let results_path = dir.path().join("results.csv");
        std::fs::write(&input_path, input).unwrap();
        std::fs::write(&results_path, RESULTS).unwrap();
        (dir, input_path, results_path)
    }

    #[test]
    fn test_merge_appends_taxonomy() {
        let (dir, input, results) = setup("ID,Name\n1,coyote\n2,Canis latrans\n3,dragon\n");
        let output = dir.path().join("merged.csv");
        let stats = merge_results(&input, &results, &output, MergeOptions { column: 1, prepend: false }).unwrap();

        assert_eq!(stats, MergeStats { rows: 3, matched: 2 });
        let contents = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ID,Name,Kingdom,Phylum,Class,Order,Family,Genus,ScientificName",
                "1,coyote,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans",
                "2,Canis latrans,Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans",
                "3,dragon,NA,NA,NA,NA,NA,NA,NA",
            ]
        );
    }

    #[test]
    fn test_merge_prepend() {
        let (dir, input, results) = setup("Name\tCount\ncoyote\t4\n");
        let output = dir.path().join("merged.csv");
        merge_results(&input, &results, &output, MergeOptions { column: 0, prepend: true }).unwrap();

        let contents = std::fs::read_to_string(&output).unwrap();
        assert_eq!(contents.lines().nth(1), Some("Animalia,Chordata,Mammalia,Carnivora,Canidae,Canis,Canis latrans,coyote,4"));
    }

    #[test]
    fn test_merge_rejects_bad_column() {
        let (dir, input, results) = setup("Name\ncoyote\n");
        let err = merge_results(&input, &results, &dir.path().join("o.csv"), MergeOptions { column: 3, prepend: false });
        assert!(matches!(err, Err(KestrelError::Parse(_))));
    }
}
