//! Output formatters for scan results.
//!
//! This module provides different output formats for a [`ScanResult`]:
//! - Plain text for terminals
//! - JSON for automation and scripting
//! - CSV for spreadsheet import, one table at a time
//!
//! # Example
//!
//! ```no_run
//! use dupscan::duplicates::Engine;
//! use dupscan::error::ExitCode;
//! use dupscan::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let result = Engine::default().scan(Path::new(".")).unwrap();
//!
//! // Output as JSON to stdout
//! let output = JsonOutput::new(&result, ExitCode::for_result(&result));
//! println!("{}", output.to_json_pretty().unwrap());
//! ```
//!
//! [`ScanResult`]: crate::duplicates::ScanResult

pub mod csv;
pub mod json;
pub mod text;

// Re-export main types
pub use csv::{CsvOutput, CsvTable};
pub use json::JsonOutput;
pub use text::TextOutput;
