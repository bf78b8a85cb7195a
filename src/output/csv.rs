//! CSV output formatter for scan results.
//!
//! Provides machine-readable CSV output for spreadsheets and data analysis.
//! A CSV document holds one table, chosen with [`CsvTable`]:
//!
//! - `exact` / `fuzzy`: `path1,path2,content_match,name1,name2`, one row per
//!   (anchor, member) pair
//! - `metadata`: `path,name,extension,human_size,mime_type,mime_encoding,content_digest`
//! - `timing`: `folder_name,serial_elapsed_secs,parallel_elapsed_secs`
//!
//! # Example
//!
//! ```no_run
//! use dupscan::duplicates::Engine;
//! use dupscan::output::csv::{CsvOutput, CsvTable};
//! use std::path::Path;
//!
//! let result = Engine::default().scan(Path::new(".")).unwrap();
//! CsvOutput::new(&result, CsvTable::Exact)
//!     .write_to(std::io::stdout())
//!     .unwrap();
//! ```

use std::io;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duplicates::{DuplicateRow, ScanResult};
use crate::scanner::format_size;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Which table of a scan to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvTable {
    /// Exact duplicate pairs
    #[default]
    Exact,
    /// Fuzzy duplicate pairs
    Fuzzy,
    /// One row per discovered file
    Metadata,
    /// Serial vs. parallel time per folder name
    Timing,
}

#[derive(Debug, Serialize)]
struct PairRow {
    path1: String,
    path2: String,
    content_match: bool,
    name1: String,
    name2: String,
}

impl From<DuplicateRow> for PairRow {
    fn from(row: DuplicateRow) -> Self {
        Self {
            path1: row.path1.to_string_lossy().into_owned(),
            path2: row.path2.to_string_lossy().into_owned(),
            content_match: row.content_match,
            name1: row.name1,
            name2: row.name2,
        }
    }
}

#[derive(Debug, Serialize)]
struct FileRow<'a> {
    path: String,
    name: &'a str,
    extension: &'a str,
    human_size: String,
    mime_type: &'a str,
    mime_encoding: &'a str,
    content_digest: &'a str,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    result: &'a ScanResult,
    table: CsvTable,
}

impl<'a> CsvOutput<'a> {
    /// Create a formatter for one table of `result`.
    #[must_use]
    pub fn new(result: &'a ScanResult, table: CsvTable) -> Self {
        Self { result, table }
    }

    /// Write the CSV output to the given writer.
    ///
    /// A header row is always written, even for an empty table.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        match self.table {
            CsvTable::Exact | CsvTable::Fuzzy => {
                let rows = if self.table == CsvTable::Exact {
                    self.result.exact_rows()
                } else {
                    self.result.fuzzy_rows()
                };
                if rows.is_empty() {
                    csv_writer.write_record(["path1", "path2", "content_match", "name1", "name2"])?;
                }
                for row in rows {
                    csv_writer.serialize(PairRow::from(row))?;
                }
            }
            CsvTable::Metadata => {
                let records = self.result.metadata();
                if records.is_empty() {
                    csv_writer.write_record([
                        "path",
                        "name",
                        "extension",
                        "human_size",
                        "mime_type",
                        "mime_encoding",
                        "content_digest",
                    ])?;
                }
                for record in records.values() {
                    csv_writer.serialize(FileRow {
                        path: record.path.to_string_lossy().into_owned(),
                        name: &record.name,
                        extension: &record.extension,
                        human_size: format_size(record.size_bytes),
                        mime_type: record.mime_type.as_deref().unwrap_or(""),
                        mime_encoding: record.mime_encoding.as_deref().unwrap_or(""),
                        content_digest: record.content_digest.as_deref().unwrap_or(""),
                    })?;
                }
            }
            CsvTable::Timing => {
                let timings = self.result.folder_timings();
                if timings.is_empty() {
                    csv_writer.write_record([
                        "folder_name",
                        "serial_elapsed_secs",
                        "parallel_elapsed_secs",
                    ])?;
                }
                for timing in timings {
                    csv_writer.serialize(timing)?;
                }
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
