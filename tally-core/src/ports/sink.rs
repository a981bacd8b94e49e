//! Report sink port - where merge results go

use std::path::PathBuf;

use crate::domain::result::Result;
use crate::domain::{AnnualReport, BatchOutcome, DetailRow};
use crate::services::merge::MergeOutcome;

/// Everything an annual export writes
#[derive(Debug, Clone, Copy)]
pub struct AnnualExport<'a> {
    pub name: &'a str,
    pub outcome: &'a MergeOutcome,
    pub report: &'a AnnualReport,
    pub detail: &'a [DetailRow],
}

/// Writes merge results somewhere durable
pub trait ReportSink: Send + Sync {
    /// Format name (e.g. "csv", "duckdb")
    fn format(&self) -> &str;

    /// Where an output called `name` lands. Used to skip work already done.
    fn target(&self, name: &str) -> PathBuf;

    /// Write the merged view and the duplicate report of one batch
    fn write_batch(&self, name: &str, outcome: &BatchOutcome) -> Result<Vec<PathBuf>>;

    /// Write profiles, ledger, aggregate table and per-member detail
    fn write_annual(&self, export: &AnnualExport<'_>) -> Result<Vec<PathBuf>>;
}
