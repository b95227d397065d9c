/// Turn a column of free-text names into grouped search terms
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::info;

use super::term::{percent_encode, Status, Term};
use crate::bio::taxonomy::species_caps;
use crate::utils::files::{read_table, write_table};
use crate::{KestrelError, Result};

pub const REJECTED_HEADER: [&str; 3] = ["Query", "SearchTerm", "Reason"];

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\s.'-]").expect("valid pattern"));

/// Words that describe age rather than species
const INFANCY_WORDS: [&str; 3] = ["fetus", "juvenile", "infant"];

/// An input query the extractor refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub query: String,
    pub term: String,
    pub reason: Status,
}

/// Accepted terms keyed by escaped search term, plus every rejection
#[derive(Debug, Default)]
pub struct Extraction {
    pub terms: IndexMap<String, Term>,
    pub rejected: Vec<Rejection>,
    pub accepted: usize,
}

impl Extraction {
    /// Group raw queries by their normalized search term
    pub fn from_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extraction = Self::default();
        for query in queries {
            let query = query.as_ref().trim();
            if query.is_empty() {
                continue;
            }
            match normalize_query(query) {
                Ok(term) => {
                    extraction.accepted += 1;
                    extraction
                        .terms
                        .entry(percent_encode(&term))
                        .or_insert_with(|| Term::new(&term))
                        .add_query(query);
                }
                Err((term, reason)) => extraction.rejected.push(Rejection {
                    query: query.to_string(),
                    term,
                    reason,
                }),
            }
        }
        extraction
    }

    /// Write rejections as `Query,SearchTerm,Reason`
    pub fn write_rejected(&self, path: &Path) -> Result<()> {
        write_table(
            path,
            &REJECTED_HEADER,
            self.rejected
                .iter()
                .map(|r| [r.query.as_str(), r.term.as_str(), r.reason.as_str()]),
        )
    }
}

/// Read column `column` of a headed table and extract its search terms
pub fn extract_terms(input: &Path, column: usize) -> Result<Extraction> {
    let table = read_table(input)?;
    if column >= table.headers.len() {
        return Err(KestrelError::Parse(format!(
            "{} has {} columns, column {} requested",
            input.display(),
            table.headers.len(),
            column
        )));
    }

    let extraction =
        Extraction::from_queries(table.rows.iter().filter_map(|row| row.get(column)));
    info!(
        accepted = extraction.accepted,
        unique = extraction.terms.len(),
        rejected = extraction.rejected.len(),
        "Extracted search terms"
    );
    Ok(extraction)
}

/// Normalize one raw query into a search term, or say why it was rejected.
/// Rejections carry whatever partial term had been produced.
pub fn normalize_query(query: &str) -> std::result::Result<String, (String, Status)> {
    if query.chars().count() < 3 {
        return Err((String::new(), Status::TooShort));
    }

    let term = collapse_whitespace(query);
    if let Some(status) = check_certainty(&term) {
        return Err((term, status));
    }

    let term = species_caps(&term);
    let term = remove_infancy(&term);
    let term = reformat(&term);
    let term = species_caps(&strip_characters(&term));

    if term.chars().count() < 3 {
        return Err((term, Status::TooShort));
    }
    Ok(term)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_word(value: &str, word: &str) -> bool {
    value.split_whitespace().any(|w| w == word)
}

/// Uncertain or hybrid phrasing
fn check_certainty(term: &str) -> Option<Status> {
    let lower = term.to_lowercase();
    if lower.contains('?') || lower.contains("unknown") || has_word(&lower, "not") {
        Some(Status::UncertainEntry)
    } else if lower.contains("hybrid") && !has_word(&lower, "hybrida") {
        // "hybrida" is a valid specific epithet
        Some(Status::Hybrid)
    } else if has_word(&lower, "x") || has_word(&lower, "mix") {
        Some(Status::Hybrid)
    } else {
        None
    }
}

fn remove_infancy(term: &str) -> String {
    if term.split_whitespace().count() < 2 {
        return term.to_string();
    }
    term.split_whitespace()
        .filter(|w| !INFANCY_WORDS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop everything between the first `open` and the last `close`, or just
/// the marks themselves when they are unbalanced
fn slice_between(term: &str, open: char, close: char) -> String {
    match (term.find(open), term.rfind(close)) {
        (Some(start), Some(end)) if start < end => {
            collapse_whitespace(&format!("{} {}", &term[..start], &term[end + close.len_utf8()..]))
        }
        _ => term.replace([open, close], ""),
    }
}

fn reformat(term: &str) -> String {
    let mut term = term.to_string();

    if term.contains('(') || term.contains(')') {
        term = slice_between(&term, '(', ')');
    }
    if term.contains('"') {
        term = slice_between(&term, '"', '"');
    }

    // Keep the longer side of a slash
    if let Some(idx) = term.find('/') {
        let (left, right) = (&term[..idx], &term[idx + 1..]);
        let longer = if left.len() <= right.len() { right } else { left };
        term = longer.to_string();
    }

    if term.contains('&') {
        let trimmed = term.trim_matches(|c: char| c == '&' || c.is_whitespace());
        term = collapse_whitespace(&trimmed.replace('&', " and "));
    }

    // Drop the word carrying a '#' and whatever sits on its far side
    let words: Vec<&str> = term.split_whitespace().collect();
    if let Some(idx) = words.iter().position(|w| w.contains('#')) {
        let kept = if idx * 2 < words.len() {
            &words[idx + 1..]
        } else {
            &words[..idx]
        };
        term = kept.join(" ");
    }

    term
}

/// Remove digits and punctuation other than `.`, `-` and `'`
fn strip_characters(term: &str) -> String {
    let kept = DISALLOWED.replace_all(term, "");
    let kept = kept.trim_start_matches(['.', '-']).trim_end_matches('-');
    collapse_whitespace(kept)
}
