//! Migration service - applies embedded SQL migrations
//!
//! Works over any migration set: the export database uses `MIGRATIONS`, the
//! log database uses `LOG_MIGRATIONS`. Applied names are tracked in the
//! `sys_migrations` table so every run is idempotent.

use anyhow::{Context, Result};
use duckdb::Connection;

use crate::migrations::MIGRATIONS;

const BOOTSTRAP: &str = "000_migrations.sql";

/// What one `run_pending` call did
#[derive(Debug)]
pub struct MigrationResult {
    pub applied: Vec<String>,
    /// Migrations found in `sys_migrations` before this run
    pub already_applied: usize,
}

/// Applies a migration set to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    /// Migration service for the export database
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_migrations(conn, MIGRATIONS)
    }

    pub fn with_migrations(conn: &'a Connection, migrations: &'static [(&'static str, &'static str)]) -> Self {
        Self { conn, migrations }
    }

    /// Bootstrap the tracking table if needed, then apply pending migrations in order
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut applied = Vec::new();

        if !self.migrations_table_exists() {
            if let Some((name, sql)) = self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP) {
                self.conn
                    .execute_batch(sql)
                    .with_context(|| format!("Failed to apply {}", name))?;
                self.mark_applied(name)?;
                applied.push(name.to_string());
            }
        }

        let recorded = self.applied_names()?;
        let already_applied = recorded.len().saturating_sub(applied.len());

        for (name, sql) in self.migrations.iter() {
            if *name == BOOTSTRAP || recorded.iter().any(|r| r == name) {
                continue;
            }
            self.conn
                .execute_batch(sql)
                .with_context(|| format!("Failed to apply {}", name))?;
            self.mark_applied(name)?;
            applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    fn migrations_table_exists(&self) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false)
    }

    /// Names of applied migrations, sorted
    pub fn applied_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<duckdb::Result<Vec<_>>>()
            .context("Failed to read sys_migrations")
    }

    /// Names of migrations not yet applied
    pub fn pending_names(&self) -> Result<Vec<String>> {
        let done = self.applied_names()?;
        Ok(self
            .migrations
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| !done.contains(name))
            .collect())
    }

    fn mark_applied(&self, name: &str) -> Result<()> {
        self.conn
            .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
            .with_context(|| format!("Failed to record {}", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;

    #[test]
    fn test_second_run_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn);

        let first = service.run_pending().unwrap();
        assert_eq!(first.applied.len(), MIGRATIONS.len());
        assert_eq!(first.already_applied, 0);
        assert!(service.pending_names().unwrap().is_empty());

        let second = service.run_pending().unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, MIGRATIONS.len());
    }

    #[test]
    fn test_pending_excludes_bootstrap_once_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        let (name, sql) = MIGRATIONS[0];
        assert_eq!(name, BOOTSTRAP);
        conn.execute_batch(sql).unwrap();
        conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
            .unwrap();

        let service = MigrationService::new(&conn);
        let pending = service.pending_names().unwrap();
        assert!(!pending.iter().any(|p| p == BOOTSTRAP));
        assert_eq!(pending.len() + 1, MIGRATIONS.len());
        assert_eq!(service.applied_names().unwrap(), vec![BOOTSTRAP.to_string()]);
    }

    #[test]
    fn test_log_set_creates_sys_logs() {
        let conn = Connection::open_in_memory().unwrap();
        let result = MigrationService::with_migrations(&conn, LOG_MIGRATIONS)
            .run_pending()
            .unwrap();
        assert_eq!(result.applied.len(), LOG_MIGRATIONS.len());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
