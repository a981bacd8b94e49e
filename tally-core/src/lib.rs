//! Tally Core - reconciliation of monthly member payment records
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Core values (Period, MemberKey, Snapshot, Ledger, reports)
//! - **ports**: Trait definitions for inputs and outputs (SourceProvider, ReportSink)
//! - **services**: Schema resolution, parsing, merging, statistics, batch runs
//! - **adapters**: Concrete implementations (folders and zips, CSV, DuckDB)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::{Path, PathBuf};

use anyhow::Result;

use adapters::FolderSource;
use config::Config;
use services::pipeline::PipelineService;

// Re-export commonly used types at crate root
pub use domain::{
    AggregateTable, AnnualReport, BatchOutcome, CanonicalField, CanonicalProfile, DetailRow, DuplicateRow,
    GroupBy, Ledger, LedgerEntry, MemberKey, MergedRow, Period, PeriodSummary, Snapshot,
};
pub use domain::result::{Error, OperationResult};
pub use services::{EntryPoint, LogEntry, LogEvent, LoggingService};

/// Main context for Tally operations
///
/// Holds the loaded configuration and the services built from it.
pub struct TallyContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub pipeline: PipelineService,
}

impl TallyContext {
    /// Create a context from the settings in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Ok(Self::with_config(data_dir, config))
    }

    pub fn with_config(data_dir: &Path, config: Config) -> Self {
        let pipeline = PipelineService::new(config.ingest_service(), config.temporal_merge());
        Self {
            config,
            data_dir: data_dir.to_path_buf(),
            pipeline,
        }
    }

    /// Folder or file source using the configured text encodings
    pub fn source(&self, path: &Path) -> FolderSource {
        FolderSource::new(path).with_encodings(self.config.text_encodings.clone())
    }
}
