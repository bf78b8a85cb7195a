//! dupscan - Duplicate and near-duplicate file finder
//!
//! Walks a directory tree, expanding zip/tar/gzip archives into sibling
//! folders as they are found, fingerprints every file with BLAKE3 and groups
//! files whose names are similar and whose sizes are equal. Each pair is
//! annotated with whether the contents are identical. A serial walk of the
//! same tree is timed against the concurrent one, per folder and in total.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::{Engine, ScanResult};
use crate::error::ExitCode;
use crate::output::{CsvOutput, CsvTable, JsonOutput, TextOutput};
use crate::progress::Progress;

/// Run one scan as described by `cli` and print the report on stdout.
///
/// # Errors
///
/// Returns an error if the scan cannot start, is interrupted, times out, or
/// the report cannot be written.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let handler = signal::install_handler().context("Failed to install signal handler")?;
    let config = Config::load(&cli);
    log::debug!("Effective configuration: {:?}", config);

    let mut engine_config = config.engine_config().with_shutdown_flag(handler.get_flag());
    if !(cli.quiet || cli.no_progress) {
        engine_config = engine_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let engine = Engine::new(engine_config);
    let result = engine
        .scan(&cli.path)
        .with_context(|| format!("Failed to scan {}", cli.path.display()))?;

    let exit_code = ExitCode::for_result(&result);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(&result, config.output, cli.table, exit_code, &mut out)?;
    out.flush().context("Failed to flush output")?;

    log::info!(
        "Done: {} exact, {} fuzzy, {} skipped",
        result.exact_clusters().len(),
        result.fuzzy_clusters().len(),
        result.failures().len()
    );
    Ok(exit_code)
}

/// Write `result` to `out` in the chosen format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn render<W: Write>(
    result: &ScanResult,
    format: OutputFormat,
    table: CsvTable,
    exit_code: ExitCode,
    out: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => TextOutput::new(result)
            .write_to(out)
            .context("Failed to write text report")?,
        OutputFormat::Json => JsonOutput::new(result, exit_code)
            .write_to(out, true)
            .context("Failed to write JSON report")?,
        OutputFormat::Csv => CsvOutput::new(result, table)
            .write_to(out)
            .context("Failed to write CSV report")?,
    }
    Ok(())
}
