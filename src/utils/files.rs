/// Delimited-text readers and writers with transparent gzip support
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{KestrelError, Result};

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

/// Open a file for reading, decompressing `.gz` files
pub fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Create (truncate) a file for writing, compressing `.gz` files
pub fn create_writer(path: &Path) -> Result<Box<dyn Write + Send>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufWriter::new(GzEncoder::new(file, Compression::default()))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Guess the delimiter from a header line: tab, then comma, then semicolon
pub fn sniff_delimiter(header: &str) -> u8 {
    [b'\t', b',', b';']
        .into_iter()
        .find(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

/// A delimited table read fully into memory
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub delimiter: u8,
}

impl Table {
    /// Index of a header column, matched case-insensitively
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Like [`Table::column`] but a missing column is a parse error
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| KestrelError::Parse(format!("missing column '{}'", name)))
    }
}

/// Read a headed delimited file. Rows may be ragged.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut contents = String::new();
    open_reader(path)?.read_to_string(&mut contents)?;
    let delimiter = sniff_delimiter(contents.lines().next().unwrap_or_default());

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }

    Ok(Table {
        headers,
        rows,
        delimiter,
    })
}

/// Write a header and rows to `path` as comma-separated text
pub fn write_table<I, R>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new().flexible(true).from_writer(create_writer(path)?);
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Open `path` for appending CSV rows, creating it with `header` if it does not exist.
/// Returns the writer and whether the file already existed.
pub fn append_writer(path: &Path, header: &[&str]) -> Result<(Writer<File>, bool)> {
    let existed = path.exists();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
    if !existed {
        writer.write_record(header)?;
        writer.flush()?;
    }
    Ok((writer, existed))
}
