//! Integration tests for tally-core
//!
//! Real files on disk go through the folder source, ingest, merge and
//! statistics services, and out through the CSV sink.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use tempfile::TempDir;

use tally_core::adapters::CsvSink;
use tally_core::config::Config;
use tally_core::ports::{AnnualExport, ReportSink};
use tally_core::services::{BatchRunner, FolderStatus, SubfolderMerge};
use tally_core::{GroupBy, MemberKey, Period, TallyContext};

// ============================================================================
// Test Helpers
// ============================================================================

const HEADER: &str = "고유번호,지역,이름,금액,메모\n";

fn create_context(temp_dir: &TempDir) -> TallyContext {
    TallyContext::with_config(temp_dir.path(), Config::default())
}

fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn write_month(root: &Path, relative: &str, rows: &[&str]) -> PathBuf {
    let mut content = HEADER.to_string();
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    write_file(root, relative, &content)
}

fn code(id: &str) -> MemberKey {
    MemberKey::ByUniqueCode(id.to_string())
}

fn period(s: &str) -> Period {
    Period::from_str(s).unwrap()
}

// ============================================================================
// Temporal Merge Tests
// ============================================================================

#[test]
fn test_latest_period_defines_profile() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_month(&inputs, "2024.01/members.csv", &["00000001-00001,North,Kim,100,"]);
    write_month(&inputs, "2024.03/members.csv", &["00000001-00001,South,Kim,300,"]);
    write_month(&inputs, "2024.02/members.csv", &["00000001-00001,East,Kim,200,"]);

    let ctx = create_context(&temp_dir);
    let (ingest, outcome) = ctx.pipeline.temporal(&ctx.source(&inputs)).unwrap();

    assert_eq!(ingest.accepted.len(), 3);
    assert!(ingest.rejected.is_empty());

    let profile = outcome.profile(&code("00000001-00001")).unwrap();
    assert_eq!(profile.attributes.region.as_deref(), Some("South"));
    assert_eq!(profile.last_period, period("2024.03"));

    assert_eq!(outcome.ledger.len(), 3);
    let feb = outcome.ledger.get(&code("00000001-00001"), period("2024.02")).unwrap();
    assert_eq!(feb.amount, Some(Decimal::from(200)));
    assert_eq!(feb.region.as_deref(), Some("East"));
}

#[test]
fn test_undated_sources_stay_out_of_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_month(&inputs, "2024.04/members.csv", &["00000001-00001,North,Kim,100,"]);
    write_month(&inputs, "misc.csv", &["00000002-00002,North,Lee,100,"]);

    let ctx = create_context(&temp_dir);
    let (_, outcome) = ctx.pipeline.temporal(&ctx.source(&inputs)).unwrap();

    assert_eq!(outcome.undated, vec!["misc.csv".to_string()]);
    assert_eq!(outcome.ledger.len(), 1);
    assert!(outcome.profile(&code("00000002-00002")).is_none());
}

#[test]
fn test_period_from_file_name() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_month(&inputs, "tithe 24.05.csv", &["00000001-00001,North,Kim,100,"]);

    let ctx = create_context(&temp_dir);
    let (_, outcome) = ctx.pipeline.temporal(&ctx.source(&inputs)).unwrap();

    assert!(outcome.periods.contains(&period("2024.05")));
    assert!(outcome.undated.is_empty());
}

// ============================================================================
// Batch Merge Tests
// ============================================================================

#[test]
fn test_batch_reports_only_valued_duplicates() {
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().join("2024.05");
    write_month(&folder, "east.csv", &["A,East,Kim,,"]);
    write_month(&folder, "north.csv", &["A,North,Kim,1000,", "B,North,Lee,3000,"]);
    write_month(&folder, "south.csv", &["A,South,Kim,2000,"]);

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.batch(&ctx.source(&folder)).unwrap();

    let duplicates = &run.outcome.duplicates;
    assert_eq!(duplicates.len(), 2);
    assert!(duplicates.iter().all(|d| d.member_id == "A"));
    let amounts: Vec<Decimal> = duplicates.iter().filter_map(|d| d.amount).collect();
    assert_eq!(amounts, vec![Decimal::from(1000), Decimal::from(2000)]);

    let merged = &run.outcome.merged;
    assert_eq!(merged.len(), 2);
    let a = merged.iter().find(|r| r.key.as_str() == "A").unwrap();
    assert!(a.amount == Some(Decimal::from(1000)) || a.amount == Some(Decimal::from(2000)));
    assert!(merged.iter().any(|r| r.key.as_str() == "B"));
}

#[test]
fn test_broken_inputs_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().join("2024.07");
    write_month(&folder, "good.csv", &["00000001-00001,North,Kim,100,"]);
    write_file(&folder, "broken.xlsx", "this is not a workbook");
    write_file(&folder, "no-header.csv", "a,b,c\n1,2,3\n");
    write_file(&folder, "~$good.xlsx", "lock file");

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.batch(&ctx.source(&folder)).unwrap();

    assert_eq!(run.ingest.accepted.len(), 1);
    assert_eq!(run.ingest.rejected.len(), 2);
    let labels: Vec<&str> = run.ingest.rejected.iter().map(|r| r.label.as_str()).collect();
    assert!(labels.contains(&"broken.xlsx"));
    assert!(labels.contains(&"no-header.csv"));
    assert_eq!(run.outcome.merged.len(), 1);
}

#[test]
fn test_header_below_title_rows() {
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().join("2024.08");
    write_file(
        &folder,
        "report.csv",
        "2024년 8월 십일조 현황,,,\n작성: 본부,,,\n고유번호,지역,이름,금액\n00000001-00001,North,Kim,\"1,000\"\n",
    );

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.batch(&ctx.source(&folder)).unwrap();

    assert_eq!(run.outcome.merged.len(), 1);
    assert_eq!(run.outcome.merged[0].amount, Some(Decimal::from(1000)));
    assert_eq!(run.outcome.merged[0].attributes.region.as_deref(), Some("North"));
}

// ============================================================================
// Text Input Tests
// ============================================================================

#[test]
fn test_text_file_joins_the_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_file(
        &inputs,
        "2024.06/transfers.txt",
        "Переводы за июнь\n00300725-00026 / Ivan Petrov / 2 000\n",
    );

    let ctx = create_context(&temp_dir);
    let (ingest, outcome) = ctx.pipeline.temporal(&ctx.source(&inputs)).unwrap();

    assert_eq!(ingest.accepted.len(), 1);
    let entry = outcome.ledger.get(&code("00300725-00026"), period("2024.06")).unwrap();
    assert_eq!(entry.amount, Some(Decimal::from(2000)));
    assert!(entry.paid);
    let profile = outcome.profile(&code("00300725-00026")).unwrap();
    assert_eq!(profile.attributes.name_local.as_deref(), Some("Ivan Petrov"));
}

#[test]
fn test_windows_1251_inputs_keep_cyrillic() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("2024.07");
    fs::create_dir_all(&inputs).unwrap();
    let (csv, _, _) = encoding_rs::WINDOWS_1251.encode("id,Регион,amount\n00300725-00027,Москва,1000\n");
    fs::write(inputs.join("moscow.csv"), &csv).unwrap();
    let (txt, _, _) = encoding_rs::WINDOWS_1251.encode("00300725-00026 / Иван Петров / 2 000\n");
    fs::write(inputs.join("transfers.txt"), &txt).unwrap();

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.batch(&ctx.source(&inputs)).unwrap();

    assert!(run.ingest.rejected.is_empty(), "{:?}", run.ingest.rejected);
    assert_eq!(run.ingest.accepted.len(), 2);
    let moscow = run
        .outcome
        .merged
        .iter()
        .find(|row| row.key == code("00300725-00027"))
        .unwrap();
    assert_eq!(moscow.attributes.region.as_deref(), Some("Москва"));
    let ivan = run
        .outcome
        .merged
        .iter()
        .find(|row| row.key == code("00300725-00026"))
        .unwrap();
    assert_eq!(ivan.attributes.name_local.as_deref(), Some("Иван Петров"));
}

#[test]
fn test_garbled_text_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("2024.06");
    write_file(&inputs, "garbled.txt", "1001 Ivan 5000\n1002 Petr 3000\n");

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.batch(&ctx.source(&inputs)).unwrap();

    assert!(run.ingest.accepted.is_empty());
    assert_eq!(run.ingest.rejected.len(), 1);
    assert!(run.outcome.merged.is_empty());
}

// ============================================================================
// Statistics Tests
// ============================================================================

#[test]
fn test_annual_ratio_and_summary_row() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    let rows: Vec<String> = (1..=10)
        .map(|i| {
            let amount = if i <= 7 { "10000" } else { "" };
            format!("0000000{}-0000{},North,M{},{},", i % 10, i % 10, i, amount)
        })
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_month(&inputs, "2024.01/north.csv", &rows);
    write_month(&inputs, "2024.02/north.csv", &rows[..5]);

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.annual(&ctx.source(&inputs), GroupBy::Region).unwrap();

    assert_eq!(run.report.target_year, Some(2024));
    let north = &run.report.table.rows[0];
    assert_eq!(north.label, "North");
    assert_eq!(north.months[0], 70.0);
    assert_eq!(north.months[1], 100.0);
    assert_eq!(north.months[2], 0.0);
    // Months without entries stay out of the average
    assert_eq!(north.average, 85.0);

    let summary = run.report.table.summary.as_ref().unwrap();
    assert_eq!(summary.average, 85.0);
    assert_eq!(run.detail.len(), 10);
}

#[test]
fn test_mixed_years_skip_statistics() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_month(&inputs, "2024.12/north.csv", &["00000001-00001,North,Kim,100,"]);
    write_month(&inputs, "2025.01/north.csv", &["00000001-00001,North,Kim,100,"]);

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.annual(&ctx.source(&inputs), GroupBy::Region).unwrap();

    assert_eq!(run.report.target_year, None);
    assert_eq!(run.report.years_seen.iter().copied().collect::<Vec<_>>(), vec![2024, 2025]);
    assert!(run.report.table.is_empty());
    assert!(run.detail.is_empty());
    // The ledger is still built
    assert_eq!(run.outcome.ledger.len(), 2);
}

#[test]
fn test_summary_skips_exempt_members() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_file(
        &inputs,
        "2024.09/north.csv",
        "고유번호,지역,이름,금액,출결여부\n\
         00000001-00001,North,Kim,100,\n\
         00000002-00002,North,Lee,,출결제외\n\
         00000003-00003,North,Park,-,\n",
    );

    let ctx = create_context(&temp_dir);
    let run = ctx
        .pipeline
        .summary(&ctx.source(&inputs), period("2024.09"), GroupBy::Region)
        .unwrap();

    assert_eq!(run.summary.totals.total, 2);
    assert_eq!(run.summary.totals.paid, 1);
    assert_eq!(run.summary.totals.ratio, 50.0);
    assert_eq!(run.summary.totals.paid_sum, Decimal::from(100));
}

// ============================================================================
// Export Tests
// ============================================================================

#[test]
fn test_csv_sink_writes_annual_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = temp_dir.path().join("inputs");
    write_month(&inputs, "2024.01/north.csv", &["00000001-00001,North,Kim,100,", "Lee,North,,50,"]);

    let ctx = create_context(&temp_dir);
    let run = ctx.pipeline.annual(&ctx.source(&inputs), GroupBy::Region).unwrap();

    let sink = CsvSink::new(temp_dir.path().join("out"));
    let outputs = sink
        .write_annual(&AnnualExport {
            name: "annual-2024",
            outcome: &run.outcome,
            report: &run.report,
            detail: &run.detail,
        })
        .unwrap();

    assert_eq!(outputs.len(), 4);
    assert!(outputs.iter().all(|p| p.exists()));
    assert!(sink.target("annual-2024").is_dir());

    let profiles = fs::read_to_string(sink.target("annual-2024").join("profiles.csv")).unwrap();
    assert_eq!(profiles.lines().count(), 3);
}

#[test]
fn test_subfolder_merge_skips_existing_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    write_month(&root, "2024.01/north.csv", &["A,North,Kim,100,"]);
    write_month(&root, "2024.02/north.csv", &["A,North,Kim,100,", "A,North,Kim,200,"]);
    write_month(&root, "2024.03/empty.csv", &[]);
    fs::create_dir_all(root.join("notes")).unwrap();

    let ctx = create_context(&temp_dir);
    let sink = CsvSink::new(temp_dir.path().join("out"));
    let job = SubfolderMerge::new(ctx.pipeline.ingest_service(), &sink);
    let runner = BatchRunner::new(2);

    let first = job.run(&root, &runner, |_, _| {}).unwrap();
    let statuses: Vec<FolderStatus> = first.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![FolderStatus::Saved, FolderStatus::Saved, FolderStatus::Saved]);
    assert_eq!(first[1].duplicates, 2);
    assert!(sink.target("merged-2024.01").exists());

    write_month(&root, "2024.04/north.csv", &["B,North,Lee,100,"]);
    let second = job.run(&root, &runner, |_, _| {}).unwrap();
    let statuses: Vec<FolderStatus> = second.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![FolderStatus::Skipped, FolderStatus::Skipped, FolderStatus::Skipped, FolderStatus::Saved]
    );

    let forced = job.with_overwrite(true).run(&root, &runner, |_, _| {}).unwrap();
    assert!(forced.iter().all(|r| r.status == FolderStatus::Saved));
}
