//! CLI command implementations

pub mod annual;
pub mod batch;
pub mod columns;
pub mod config;
pub mod logs;
pub mod merge;
pub mod parse_text;
pub mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tally_core::adapters::{CsvSink, DuckDbSink};
use tally_core::domain::SourceFailure;
use tally_core::ports::ReportSink;
use tally_core::{EntryPoint, LogEvent, LoggingService, OperationResult, Period, TallyContext};

use crate::output;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let tally_dir = get_tally_dir();
    std::fs::create_dir_all(&tally_dir).ok()?;
    LoggingService::new(&tally_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the tally directory from environment or default
pub fn get_tally_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tally")
    }
}

/// Get a context built from the settings in the tally directory
pub fn get_context() -> Result<TallyContext> {
    let tally_dir = get_tally_dir();
    std::fs::create_dir_all(&tally_dir)
        .with_context(|| format!("Failed to create tally directory: {:?}", tally_dir))?;
    TallyContext::new(&tally_dir).context("Failed to load settings")
}

/// Sink writing into `dir` in the requested format
pub fn make_sink(format: &str, dir: &Path) -> Result<Box<dyn ReportSink>> {
    match format.to_lowercase().as_str() {
        "csv" => Ok(Box::new(CsvSink::new(dir))),
        "duckdb" => Ok(Box::new(DuckDbSink::new(dir))),
        other => anyhow::bail!("Unknown format '{}'. Use csv or duckdb.", other),
    }
}

/// Log every rejected input and, unless printing JSON, warn about it
pub fn report_rejected(logger: &Option<LoggingService>, rejected: &[SourceFailure], period: Option<Period>, json: bool) {
    for failure in rejected {
        if let Some(l) = logger {
            let _ = l.log_rejected(failure, period);
        }
        if !json {
            output::warning(&skipped(failure));
        }
    }
}

fn skipped(failure: &SourceFailure) -> String {
    format!("Skipped {}: {}", failure.label, failure.error)
}

/// Print a run's JSON envelope, listing rejected inputs as warnings
pub fn print_envelope<T: Serialize>(result: OperationResult<T>, rejected: &[SourceFailure]) -> Result<()> {
    let result = result.with_warnings(rejected.iter().map(skipped));
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
