//! JSON output formatter for scan results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "root": "/data",
//!   "summary": {
//!     "total_files": 120,
//!     "total_size": 1048576,
//!     "fingerprinted": 120,
//!     "exact_pairs": 3,
//!     "fuzzy_pairs": 1,
//!     "content_matches": 3,
//!     "skipped": 0,
//!     "elapsed_serial_secs": 0.42,
//!     "elapsed_parallel_secs": 0.15,
//!     "elapsed_concurrent_walk_secs": 0.11,
//!     "elapsed_mixed_secs": 0.63,
//!     "speedup": 3.8,
//!     "exit_code": 0,
//!     "exit_code_name": "DS000"
//!   },
//!   "exact": [
//!     {"path1": "...", "path2": "...", "content_match": true, "name1": "...", "name2": "..."}
//!   ],
//!   "fuzzy": [],
//!   "metadata": [
//!     {"path": "...", "name": "...", "extension": "txt", "human_size": "1.20 KB",
//!      "mime_type": "text/plain", "mime_encoding": null}
//!   ],
//!   "folder_timings": [
//!     {"folder_name": "docs", "serial_elapsed_secs": 0.01, "parallel_elapsed_secs": 0.004}
//!   ],
//!   "failures": [
//!     {"path": "...", "stage": "fingerprint", "reason": "Permission denied: ..."}
//!   ]
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{DuplicateRow, MetadataRow, ScanResult};
use crate::error::ExitCode;
use crate::scanner::{FolderTiming, SkippedPath};

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files discovered
    pub total_files: usize,
    /// Sum of all file sizes in bytes
    pub total_size: u64,
    /// Files with a content digest
    pub fingerprinted: usize,
    /// Exact (anchor, member) pairs
    pub exact_pairs: usize,
    /// Fuzzy (anchor, member) pairs
    pub fuzzy_pairs: usize,
    /// Pairs whose content matches
    pub content_matches: usize,
    /// Paths skipped at any stage
    pub skipped: usize,
    /// Serial timing walk, in seconds
    pub elapsed_serial_secs: f64,
    /// Whole concurrent pass, in seconds
    pub elapsed_parallel_secs: f64,
    /// Concurrent walker alone, in seconds
    pub elapsed_concurrent_walk_secs: f64,
    /// Whole run up to classification, in seconds
    pub elapsed_mixed_secs: f64,
    /// Serial walk time over concurrent walk time
    pub speedup: Option<f64>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Build the summary block for `result`.
    #[must_use]
    pub fn from_result(result: &ScanResult, exit_code: ExitCode) -> Self {
        let summary = result.summary();
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            fingerprinted: summary.fingerprinted,
            exact_pairs: summary.exact_pairs,
            fuzzy_pairs: summary.fuzzy_pairs,
            content_matches: summary.content_matches,
            skipped: summary.skipped,
            elapsed_serial_secs: result.elapsed_serial_total().as_secs_f64(),
            elapsed_parallel_secs: result.elapsed_parallel_total().as_secs_f64(),
            elapsed_concurrent_walk_secs: result.elapsed_concurrent_walk().as_secs_f64(),
            elapsed_mixed_secs: result.elapsed_mixed_total().as_secs_f64(),
            speedup: result.speedup(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Scanned root
    pub root: String,
    /// Headline numbers
    pub summary: JsonSummary,
    /// Exact duplicate rows
    pub exact: Vec<DuplicateRow>,
    /// Fuzzy duplicate rows
    pub fuzzy: Vec<DuplicateRow>,
    /// One row per discovered file
    pub metadata: Vec<MetadataRow>,
    /// Serial vs. parallel time per folder name
    pub folder_timings: Vec<FolderTiming>,
    /// Paths that were skipped, and why
    pub failures: Vec<SkippedPath>,
}

impl JsonOutput {
    /// Create the JSON document for a scan.
    #[must_use]
    pub fn new(result: &ScanResult, exit_code: ExitCode) -> Self {
        Self {
            root: result.root().to_string_lossy().into_owned(),
            summary: JsonSummary::from_result(result, exit_code),
            exact: result.exact_rows(),
            fuzzy: result.fuzzy_rows(),
            metadata: result.metadata_rows(),
            folder_timings: result.folder_timings().to_vec(),
            failures: result.failures().to_vec(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Arguments
    ///
    /// * `writer` - The writer to output to (e.g., stdout)
    /// * `pretty` - Whether to pretty-print the output
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
