//! Service layer - reconciliation logic and orchestration
//!
//! Pure services (schema, text_parser, merge, batch_merge, stats) work on
//! domain values only. `ingest` connects them to raw inputs, `pipeline`
//! chains a full run, `batch` runs merges over many folders, and
//! `logging`/`migration` own the databases.

pub mod batch;
pub mod batch_merge;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod migration;
pub mod pipeline;
pub mod schema;
pub mod stats;
pub mod text_parser;

pub use batch::{BatchRunner, FolderReport, FolderStatus, JobOutcome, JobStatus, SubfolderMerge};
pub use batch_merge::{detect_duplicates, BatchMerge};
pub use ingest::{IngestReport, IngestService, IngestedSource};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use merge::{MergeOutcome, TemporalMerge};
pub use migration::{MigrationResult, MigrationService};
pub use pipeline::{AnnualRun, BatchRun, PipelineService, SummaryRun};
pub use schema::{AliasTable, ColumnMapping, FieldAliases, HeaderLocation, SchemaResolver};
pub use stats::{annual_detail, annual_report, annual_table, period_summary};
pub use text_parser::{TextParseOutcome, TextParseStatus, TextParser, TextRecord};
