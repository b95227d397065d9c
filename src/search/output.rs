/// Serialized match/miss sinks and the completed-query set used to resume runs
use csv::Writer;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::terms::Term;
use crate::utils::files::{append_writer, read_table};
use crate::Result;

pub const MATCH_HEADER: [&str; 11] = [
    "Query",
    "SearchTerm",
    "Kingdom",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "Genus",
    "Species",
    "Source",
    "Confirmed",
];

pub const MISS_HEADER: [&str; 2] = ["Query", "SearchTerm"];

pub const MISSED_FILE: &str = "KestrelMissed.csv";
pub const REJECTED_FILE: &str = "KestrelRejected.csv";

/// A file named `name` in the same directory as `output`
pub fn sibling(output: &Path, name: &str) -> PathBuf {
    output.with_file_name(name)
}

struct Sinks {
    matches: Writer<File>,
    misses: Writer<File>,
    match_rows: usize,
    miss_rows: usize,
}

/// Row counts written during this run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub match_rows: usize,
    pub miss_rows: usize,
    /// The misses file was removed because it held no rows
    pub misses_removed: bool,
}

/// Appends results for finished terms.
///
/// Both sinks sit behind one lock so rows from concurrent terms never
/// interleave, and each term's rows are flushed before the lock is released.
pub struct ResultWriter {
    sinks: Mutex<Sinks>,
    done: HashSet<String>,
    output: PathBuf,
    missed: PathBuf,
    prior_misses: usize,
}

impl ResultWriter {
    /// Open `output` and its sibling misses file for appending, reading the
    /// queries already recorded in either.
    pub fn open(output: &Path) -> Result<Self> {
        let missed = sibling(output, MISSED_FILE);
        let mut done = HashSet::new();
        read_completed(output, &mut done)?;
        let prior_misses = read_completed(&missed, &mut done)?;
        if !done.is_empty() {
            info!(queries = done.len(), "Found completed entries in previous output");
        }

        let (matches, _) = append_writer(output, &MATCH_HEADER)?;
        let (misses, _) = append_writer(&missed, &MISS_HEADER)?;

        Ok(Self {
            sinks: Mutex::new(Sinks {
                matches,
                misses,
                match_rows: 0,
                miss_rows: 0,
            }),
            done,
            output: output.to_path_buf(),
            missed,
            prior_misses,
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn missed_path(&self) -> &Path {
        &self.missed
    }

    /// Number of queries recorded by earlier runs
    pub fn completed(&self) -> usize {
        self.done.len()
    }

    /// True if any of the term's queries already has a row
    pub fn is_done(&self, term: &Term) -> bool {
        term.queries().any(|query| self.done.contains(query))
    }

    pub fn write_match(&self, term: &Term) -> Result<()> {
        let rows = term.match_rows();
        let mut sinks = self.sinks.lock();
        for row in &rows {
            sinks.matches.write_record(row)?;
        }
        sinks.matches.flush()?;
        sinks.match_rows += rows.len();
        Ok(())
    }

    pub fn write_miss(&self, term: &Term) -> Result<()> {
        let rows = term.miss_rows();
        let mut sinks = self.sinks.lock();
        for row in &rows {
            sinks.misses.write_record(row)?;
        }
        sinks.misses.flush()?;
        sinks.miss_rows += rows.len();
        Ok(())
    }

    /// Flush both sinks and delete the misses file if it has no rows
    pub fn finish(&self) -> Result<WriteSummary> {
        let mut sinks = self.sinks.lock();
        sinks.matches.flush()?;
        sinks.misses.flush()?;

        let mut summary = WriteSummary {
            match_rows: sinks.match_rows,
            miss_rows: sinks.miss_rows,
            misses_removed: false,
        };
        if self.prior_misses + sinks.miss_rows == 0 && self.missed.exists() {
            std::fs::remove_file(&self.missed)?;
            summary.misses_removed = true;
        }
        Ok(summary)
    }
}

/// Add every query in the first column of `path` to `done`.
/// Returns the number of data rows read.
fn read_completed(path: &Path, done: &mut HashSet<String>) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let table = read_table(path)?;
    let column = table.column("Query").unwrap_or(0);
    for (line, row) in table.rows.iter().enumerate() {
        match row.get(column).map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                done.insert(query.to_string());
            }
            None => warn!(path = %path.display(), line = line + 2, "Skipping row without a query"),
        }
    }
    info!(path = %path.display(), rows = table.rows.len(), "Read previous output");
    Ok(table.rows.len())
}
