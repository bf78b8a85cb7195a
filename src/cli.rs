//! Command-line interface definitions for dupscan.
//!
//! This module defines all CLI arguments and options using the clap derive API.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory and print a plain-text report
//! dupscan ~/Downloads
//!
//! # JSON output for scripting
//! dupscan ~/Downloads --output json
//!
//! # Leave archives alone and stop after ten minutes
//! dupscan ~/Downloads --no-archives --timeout 600
//!
//! # Verbose mode for debugging
//! dupscan -v ~/Downloads
//! ```

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::output::CsvTable;

/// Duplicate and near-duplicate file finder.
///
/// dupscan walks a directory tree (expanding archives along the way), groups
/// files whose names and sizes match, and reports which of those pairs also
/// have identical content. It also times a serial walk against a concurrent
/// one over the same tree.
#[derive(Debug, Parser)]
#[command(name = "dupscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print fatal errors as a JSON document on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Do not display progress spinners and bars
    #[arg(long)]
    pub no_progress: bool,

    /// Configuration file (default: platform config dir / config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Table written by `--output csv`
    #[arg(long, value_enum, default_value_t = CsvTable::Exact)]
    pub table: CsvTable,

    /// Do not extract archives found during the scan
    #[arg(long)]
    pub no_archives: bool,

    /// Nesting limit for archives inside archives
    #[arg(long, value_name = "N")]
    pub max_archive_depth: Option<usize>,

    /// Number of directory walker threads
    #[arg(long, value_name = "N")]
    pub walk_threads: Option<usize>,

    /// Number of fingerprinting threads
    #[arg(long, value_name = "N")]
    pub hash_threads: Option<usize>,

    /// Stop the scan after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text tables
    #[default]
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
