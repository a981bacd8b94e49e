//! DuckDB sink - writes merge results into a database file per output
//!
//! The schema is created by the embedded migrations on first open. Each
//! write is tagged with a fresh run id so re-running into the same file
//! appends a new run instead of mixing rows.

use std::path::{Path, PathBuf};

use chrono::Utc;
use duckdb::{params, Connection};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregateRow, BatchOutcome, MemberAttributes, MemberKey};
use crate::ports::{AnnualExport, ReportSink};
use crate::services::MigrationService;

fn db_err(e: duckdb::Error) -> Error {
    Error::database(e.to_string())
}

fn as_f64(amount: Option<Decimal>) -> Option<f64> {
    amount.and_then(|a| a.to_f64())
}

fn key_kind(key: &MemberKey) -> &'static str {
    match key {
        MemberKey::ByUniqueCode(_) => "code",
        MemberKey::ByDisplayName(_) => "name",
    }
}

/// Open (or create) a database file and bring its schema up to date
pub fn open_database(path: &Path) -> Result<Connection> {
    let config = duckdb::Config::default()
        .enable_autoload_extension(false)
        .map_err(db_err)?;
    let conn = Connection::open_with_flags(path, config).map_err(db_err)?;
    MigrationService::new(&conn)
        .run_pending()
        .map_err(|e| Error::database(format!("{:#}", e)))?;
    Ok(conn)
}

/// Writes one `.duckdb` file per output name under a root folder
#[derive(Debug, Clone)]
pub struct DuckDbSink {
    root: PathBuf,
}

impl DuckDbSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn begin_run(&self, name: &str, kind: &str) -> Result<(Connection, PathBuf, String)> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.target(name);
        let conn = open_database(&path)?;
        let run_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO runs (run_id, kind, name, created_at) VALUES (?, ?, ?, ?)",
            params![
                &run_id,
                kind,
                name,
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )
        .map_err(db_err)?;
        Ok((conn, path, run_id))
    }
}

fn insert_attributes_sql(table: &str, leading: &[&str], trailing: &[&str]) -> String {
    let mut columns: Vec<&str> = leading.to_vec();
    columns.extend([
        "region",
        "team",
        "zone",
        "department",
        "name_local",
        "name_latin",
        "attendance",
    ]);
    columns.extend(trailing);
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", table, columns.join(", "), placeholders)
}

fn attribute_values(a: &MemberAttributes) -> [&Option<String>; 7] {
    [
        &a.region,
        &a.team,
        &a.zone,
        &a.department,
        &a.name_local,
        &a.name_latin,
        &a.attendance,
    ]
}

fn insert_batch(conn: &Connection, run_id: &str, outcome: &BatchOutcome) -> duckdb::Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    let sql = insert_attributes_sql(
        "merged_rows",
        &["run_id", "position", "member_key", "key_kind", "canonical_id"],
        &["raw", "amount", "memo", "paid", "sources"],
    );
    let mut stmt = conn.prepare(&sql)?;
    for (position, row) in outcome.merged.iter().enumerate() {
        let [region, team, zone, department, name_local, name_latin, attendance] =
            attribute_values(&row.attributes);
        stmt.execute(params![
            run_id,
            position as i64,
            row.key.as_str(),
            key_kind(&row.key),
            row.canonical_id,
            region,
            team,
            zone,
            department,
            name_local,
            name_latin,
            attendance,
            &row.raw,
            as_f64(row.amount),
            &row.memo,
            row.paid,
            row.sources.join("; "),
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO duplicate_rows (run_id, member_id, region, name, source, row_number, raw, amount, memo) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for d in &outcome.duplicates {
        stmt.execute(params![
            run_id,
            &d.member_id,
            &d.region,
            &d.name,
            &d.source,
            d.row as i64,
            &d.raw,
            as_f64(d.amount),
            &d.memo,
        ])?;
    }

    conn.execute_batch("COMMIT")
}

fn insert_aggregate_row(
    stmt: &mut duckdb::Statement<'_>,
    run_id: &str,
    group_by: &str,
    row: &AggregateRow,
    is_summary: bool,
) -> duckdb::Result<()> {
    let m = &row.months;
    stmt.execute(params![
        run_id,
        group_by,
        &row.label,
        is_summary,
        m[0],
        m[1],
        m[2],
        m[3],
        m[4],
        m[5],
        m[6],
        m[7],
        m[8],
        m[9],
        m[10],
        m[11],
        row.average,
    ])?;
    Ok(())
}

fn insert_annual(conn: &Connection, run_id: &str, export: &AnnualExport<'_>) -> duckdb::Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    let sql = insert_attributes_sql(
        "profiles",
        &["run_id", "member_key", "key_kind", "canonical_id"],
        &["attendance_exempt", "last_period", "source"],
    );
    let mut stmt = conn.prepare(&sql)?;
    for p in export.outcome.profiles.values() {
        let [region, team, zone, department, name_local, name_latin, attendance] =
            attribute_values(&p.attributes);
        stmt.execute(params![
            run_id,
            p.key.as_str(),
            key_kind(&p.key),
            p.key.has_canonical_format(),
            region,
            team,
            zone,
            department,
            name_local,
            name_latin,
            attendance,
            p.attendance_exempt,
            p.last_period.to_string(),
            &p.source,
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO ledger_entries (run_id, member_key, period, raw, amount, paid, memo, source, region, department) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for e in export.outcome.ledger.iter() {
        stmt.execute(params![
            run_id,
            e.key.as_str(),
            e.period.to_string(),
            &e.raw,
            as_f64(e.amount),
            e.paid,
            &e.memo,
            &e.source,
            &e.region,
            &e.department,
        ])?;
    }

    let table = &export.report.table;
    let group_by = table.group_by.as_str();
    let mut stmt = conn.prepare(
        "INSERT INTO aggregate_rows (run_id, group_by, label, is_summary, \
         m01, m02, m03, m04, m05, m06, m07, m08, m09, m10, m11, m12, average) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for row in &table.rows {
        insert_aggregate_row(&mut stmt, run_id, group_by, row, false)?;
    }
    if let Some(summary) = &table.summary {
        insert_aggregate_row(&mut stmt, run_id, group_by, summary, true)?;
    }

    conn.execute_batch("COMMIT")
}

impl ReportSink for DuckDbSink {
    fn format(&self) -> &str {
        "duckdb"
    }

    fn target(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.duckdb", name))
    }

    fn write_batch(&self, name: &str, outcome: &BatchOutcome) -> Result<Vec<PathBuf>> {
        let (conn, path, run_id) = self.begin_run(name, "batch")?;
        insert_batch(&conn, &run_id, outcome).map_err(db_err)?;
        Ok(vec![path])
    }

    fn write_annual(&self, export: &AnnualExport<'_>) -> Result<Vec<PathBuf>> {
        let (conn, path, run_id) = self.begin_run(export.name, "annual")?;
        insert_annual(&conn, &run_id, export).map_err(db_err)?;
        Ok(vec![path])
    }
}
