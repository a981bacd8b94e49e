//! Logging service - structured event log in DuckDB
//!
//! Events are stored in `logs.duckdb` inside the data directory. Only
//! source labels, periods, command names and error text are recorded; member
//! names, identifiers and amounts never reach the log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::{Period, SourceFailure};
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::migration::MigrationService;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

const ENTRY_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, \
     event, source, period, command, error_message, error_details";

/// Unique id: millisecond timestamp in the upper bits, a wrapping counter in the lower 16
fn generate_id() -> u64 {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Current unix time in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Which program wrote an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Library,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Library => "library",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            source: None,
            period: None,
            command: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Label of the input the event concerns
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_period(mut self, period: impl ToString) -> Self {
        self.period = Some(period.to_string());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub source: Option<String>,
    pub period: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            entry_point: row.get(2)?,
            app_version: row.get(3)?,
            platform: row.get(4)?,
            event: row.get(5)?,
            source: row.get(6)?,
            period: row.get(7)?,
            command: row.get(8)?,
            error_message: row.get(9)?,
            error_details: row.get(10)?,
        })
    }
}

/// Owns the `logs.duckdb` connection
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in `data_dir` and bring its schema up to date
    pub fn new(data_dir: &Path, entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: std::env::consts::OS,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Record an event; entry point, version and platform are filled in here
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO sys_logs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                ENTRY_COLUMNS
            ),
            duckdb::params![
                generate_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.source,
                &event.period,
                &event.command,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    /// A command was run
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// An input was left out of a run
    pub fn log_rejected(&self, failure: &SourceFailure, period: Option<Period>) -> Result<()> {
        let mut event = LogEvent::new("source_rejected")
            .with_source(&failure.label)
            .with_error(&failure.error);
        if let Some(period) = period {
            event = event.with_period(period);
        }
        self.log(event)
    }

    /// A month folder of a batch run could not be merged
    pub fn log_batch_failure(&self, folder: &str, period: Period, error: &str) -> Result<()> {
        self.log(
            LogEvent::new("batch_failed")
                .with_source(folder)
                .with_period(period)
                .with_error(error),
        )
    }

    fn query(&self, filter: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs {} ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS, filter
        ))?;
        let entries = stmt
            .query_map([limit as i64], LogEntry::from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("", limit)
    }

    /// Most recent entries that carry an error message
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("WHERE error_message IS NOT NULL", limit)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_errors(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_logs WHERE error_message IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete entries older than a unix-ms timestamp
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Copy the log database to `output_path` after a checkpoint
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let conn = self.lock()?;
        conn.execute_batch("CHECKPOINT")?;
        std::fs::copy(&self.db_path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path) -> LoggingService {
        LoggingService::new(dir, EntryPoint::Cli, "0.1.0").unwrap()
    }

    #[test]
    fn test_new_creates_database() {
        let dir = tempdir().unwrap();
        let service = open(dir.path());
        assert!(service.db_path().ends_with("logs.duckdb"));
        assert!(service.db_path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_command_entry_fields() {
        let dir = tempdir().unwrap();
        let service = open(dir.path());

        service.log_command("annual").unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.event, "command_executed");
        assert_eq!(entry.command.as_deref(), Some("annual"));
        assert_eq!(entry.entry_point, "cli");
        assert_eq!(entry.app_version, "0.1.0");
        assert_eq!(entry.platform, std::env::consts::OS);
        assert!(entry.error_message.is_none());
    }

    #[test]
    fn test_rejections_and_failures_count_as_errors() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Library, "0.1.0").unwrap();
        let failure = SourceFailure {
            label: "2024.03/north.xlsx".to_string(),
            error: "missing required columns: amount".to_string(),
        };

        service.log_command("batch").unwrap();
        service.log_rejected(&failure, Period::new(2024, 3)).unwrap();
        service
            .log_batch_failure("2024.04", Period::new(2024, 4).unwrap(), "no usable sources")
            .unwrap();

        assert_eq!(service.count().unwrap(), 3);
        assert_eq!(service.count_errors().unwrap(), 2);

        let errors = service.get_errors(10).unwrap();
        let rejected = errors.iter().find(|e| e.event == "source_rejected").unwrap();
        assert_eq!(rejected.source.as_deref(), Some("2024.03/north.xlsx"));
        assert_eq!(rejected.period.as_deref(), Some("2024.03"));
        assert_eq!(rejected.entry_point, "library");

        let failed = errors.iter().find(|e| e.event == "batch_failed").unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("no usable sources"));
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let dir = tempdir().unwrap();
        let service = open(dir.path());
        for command in ["merge", "annual", "summary"] {
            service.log_command(command).unwrap();
        }

        let entries = service.get_recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command.as_deref(), Some("summary"));
    }

    #[test]
    fn test_delete_before_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let service = open(dir.path());
            service.log(LogEvent::new("command_failed").with_error_details("trace")).unwrap();
            service.log_command("merge").unwrap();
        }

        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.2.0").unwrap();
        assert_eq!(service.count().unwrap(), 2);
        assert_eq!(service.delete_before(now_ms() + 1000).unwrap(), 2);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_export_copies_database() {
        let dir = tempdir().unwrap();
        let service = open(dir.path());
        service.log_command("logs").unwrap();

        let target = dir.path().join("copy.duckdb");
        assert_eq!(service.export(&target).unwrap(), target);

        let copy = Connection::open(&target).unwrap();
        let count: i64 = copy.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
