//! Plain-text report for terminals.
//!
//! Sections, in order: summary, exact duplicates, fuzzy duplicates, files,
//! folder timings, skipped paths. Empty sections print a single `(none)` line.

use std::io::{self, Write};

use crate::duplicates::{DuplicateRow, MetadataRow, ScanResult};
use crate::scanner::format_size;

/// Plain-text formatter.
pub struct TextOutput<'a> {
    result: &'a ScanResult,
}

impl<'a> TextOutput<'a> {
    /// Create a formatter for `result`.
    #[must_use]
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns any error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.write_summary(writer)?;
        write_pairs(writer, "Exact duplicates", &self.result.exact_rows())?;
        write_pairs(writer, "Fuzzy duplicates", &self.result.fuzzy_rows())?;
        write_files(writer, &self.result.metadata_rows())?;
        self.write_timings(writer)?;
        self.write_failures(writer)
    }

    /// Render the report into a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn write_summary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let summary = self.result.summary();
        writeln!(writer, "Scan of {}", self.result.root().display())?;
        writeln!(
            writer,
            "  files:          {} ({})",
            summary.total_files,
            format_size(summary.total_size)
        )?;
        writeln!(writer, "  fingerprinted:  {}", summary.fingerprinted)?;
        writeln!(writer, "  exact pairs:    {}", summary.exact_pairs)?;
        writeln!(writer, "  fuzzy pairs:    {}", summary.fuzzy_pairs)?;
        writeln!(writer, "  content match:  {}", summary.content_matches)?;
        writeln!(writer, "  skipped:        {}", summary.skipped)?;
        writeln!(
            writer,
            "  serial walk:    {:.3}s",
            self.result.elapsed_serial_total().as_secs_f64()
        )?;
        writeln!(
            writer,
            "  parallel pass:  {:.3}s (walker {:.3}s)",
            self.result.elapsed_parallel_total().as_secs_f64(),
            self.result.elapsed_concurrent_walk().as_secs_f64()
        )?;
        writeln!(
            writer,
            "  whole run:      {:.3}s",
            self.result.elapsed_mixed_total().as_secs_f64()
        )?;
        match self.result.speedup() {
            Some(speedup) => writeln!(writer, "  speedup:        {:.2}x", speedup)?,
            None => writeln!(writer, "  speedup:        n/a")?,
        }
        Ok(())
    }

    fn write_timings<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let timings = self.result.folder_timings();
        writeln!(writer)?;
        writeln!(writer, "Folder timings ({})", timings.len())?;
        if timings.is_empty() {
            return writeln!(writer, "  (none)");
        }
        let width = timings
            .iter()
            .map(|t| t.folder_name.chars().count())
            .max()
            .unwrap_or(0)
            .max("folder".len());
        writeln!(writer, "  {:<width$}  {:>10}  {:>10}", "folder", "serial", "parallel")?;
        for timing in timings {
            writeln!(
                writer,
                "  {:<width$}  {:>9.4}s  {:>9.4}s",
                timing.folder_name, timing.serial_elapsed_secs, timing.parallel_elapsed_secs
            )?;
        }
        Ok(())
    }

    fn write_failures<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let failures = self.result.failures();
        writeln!(writer)?;
        writeln!(writer, "Skipped paths ({})", failures.len())?;
        if failures.is_empty() {
            return writeln!(writer, "  (none)");
        }
        for failure in failures {
            writeln!(
                writer,
                "  [{}] {}: {}",
                failure.stage,
                failure.path.display(),
                failure.reason
            )?;
        }
        Ok(())
    }
}

fn write_pairs<W: Write>(writer: &mut W, title: &str, rows: &[DuplicateRow]) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{} ({})", title, rows.len())?;
    if rows.is_empty() {
        return writeln!(writer, "  (none)");
    }
    for row in rows {
        let marker = if row.content_match { "=" } else { "~" };
        writeln!(
            writer,
            "  {} {}  {}",
            marker,
            row.path1.display(),
            row.path2.display()
        )?;
    }
    Ok(())
}

fn write_files<W: Write>(writer: &mut W, rows: &[MetadataRow]) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "Files ({})", rows.len())?;
    if rows.is_empty() {
        return writeln!(writer, "  (none)");
    }
    for row in rows {
        let kind = match (&row.mime_type, &row.mime_encoding) {
            (Some(mime), Some(encoding)) => format!("{mime}; {encoding}"),
            (Some(mime), None) => mime.clone(),
            (None, _) => "-".to_string(),
        };
        let extension = if row.extension.is_empty() { "-" } else { row.extension.as_str() };
        writeln!(
            writer,
            "  {:>10}  {:<5} {:<24} {}",
            row.human_size,
            extension,
            kind,
            row.path.display()
        )?;
    }
    Ok(())
}
