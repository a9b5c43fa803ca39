//! Reading and writing the delimited citation files.
//!
//! One record per line, text fields quoted:
//!
//! ```text
//! "<key>";"<title>";<citations>;<last-update-ms>;
//! ```
//!
//! Double quotes inside key or title are stripped on write, not escaped; a
//! lossy but deliberate simplification kept for round-trip compatibility
//! with existing citation files. Exporters in the surrounding system read
//! this file concurrently, so snapshots are written to a temp file in the
//! same directory and moved into place atomically.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::record::{CitationRecord, Citations};

/// Default file name of the citation store.
pub const CITATIONS_FILE: &str = "citations.csv";

/// Default file name of the problems log.
pub const PROBLEMS_FILE: &str = "problems.csv";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Load all records from `path`.
///
/// A missing file is "nothing to do yet" and loads as the empty store.
/// Malformed lines are skipped with a warning; a half-broken store should
/// degrade, not take the service down.
pub fn load_records(path: &Path) -> Result<Vec<CitationRecord>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(record) => records.push(record),
            None => tracing::warn!(
                path = %path.display(),
                line = lineno + 1,
                "skipping malformed citation line"
            ),
        }
    }
    Ok(records)
}

/// Write a complete snapshot of `records` to `path` atomically.
pub fn write_records(path: &Path, records: &[CitationRecord]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    for record in records {
        writeln!(tmp, "{}", format_line(record))?;
    }
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Append a single record to `path`, creating the file if needed.
/// Used for the problems log only.
pub fn append_record(path: &Path, record: &CitationRecord) -> Result<(), StoreError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", format_line(record))?;
    Ok(())
}

/// Create an empty store file if none exists yet.
pub fn ensure_store(path: &Path) -> Result<(), StoreError> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn parse_line(line: &str) -> Option<CitationRecord> {
    // Quotes never survive inside key or title, so the quoted separators
    // are unambiguous even when a title contains the field delimiter.
    let rest = line.trim().strip_prefix('"')?;
    let (key, rest) = rest.split_once("\";\"")?;
    let (title, rest) = rest.split_once("\";")?;
    let mut numbers = rest.split(';');
    let citations = Citations::from_raw(numbers.next()?.trim().parse().ok()?);
    let last_update = numbers.next()?.trim().parse().ok()?;
    Some(CitationRecord {
        key: key.to_string(),
        title: title.to_string(),
        citations,
        last_update,
    })
}

fn format_line(record: &CitationRecord) -> String {
    format!(
        "\"{}\";\"{}\";{};{};",
        record.key.replace('"', ""),
        record.title.replace('"', ""),
        record.citations.to_raw(),
        record.last_update
    )
}
