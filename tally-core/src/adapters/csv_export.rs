//! CSV sink - one CSV file per output structure
//!
//! Each output lands in its own folder under the sink's root:
//! `merged.csv` and `duplicates.csv` for a batch; `profiles.csv`,
//! `ledger.csv`, `aggregate.csv` and `detail.csv` for an annual run.

use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregateRow, BatchOutcome, MemberAttributes, MemberKey};
use crate::ports::{AnnualExport, ReportSink};

const ATTRIBUTE_HEADERS: [&str; 7] = [
    "region",
    "team",
    "zone",
    "department",
    "name_local",
    "name_latin",
    "attendance",
];

fn attribute_cells(attributes: &MemberAttributes) -> [String; 7] {
    [
        &attributes.region,
        &attributes.team,
        &attributes.zone,
        &attributes.department,
        &attributes.name_local,
        &attributes.name_latin,
        &attributes.attendance,
    ]
    .map(|v| v.clone().unwrap_or_default())
}

fn key_kind(key: &MemberKey) -> &'static str {
    match key {
        MemberKey::ByUniqueCode(_) => "code",
        MemberKey::ByDisplayName(_) => "name",
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn flag(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

/// Writes CSV files under a root folder
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn open(&self, dir: &Path, file: &str) -> Result<(Writer<fs::File>, PathBuf)> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file);
        let writer = Writer::from_path(&path)
            .map_err(|e| Error::export(format!("{}: {}", path.display(), e)))?;
        Ok((writer, path))
    }

    /// Write all rows (header first) into one file
    fn write_rows<I>(&self, dir: &Path, file: &str, header: Vec<String>, rows: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let (mut writer, path) = self.open(dir, file)?;
        let fail = |e: csv::Error| Error::export(format!("{}: {}", path.display(), e));
        writer.write_record(&header).map_err(fail)?;
        for row in rows {
            writer.write_record(&row).map_err(fail)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn aggregate_cells(row: &AggregateRow) -> Vec<String> {
    let mut cells = vec![row.label.clone()];
    cells.extend(row.months.iter().map(|m| format!("{:.1}", m)));
    cells.push(format!("{:.1}", row.average));
    cells
}

impl ReportSink for CsvSink {
    fn format(&self) -> &str {
        "csv"
    }

    fn target(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write_batch(&self, name: &str, outcome: &BatchOutcome) -> Result<Vec<PathBuf>> {
        let dir = self.target(name);

        let mut header = strings(&["member_key", "key_kind", "canonical_id"]);
        header.extend(strings(&ATTRIBUTE_HEADERS));
        header.extend(strings(&["raw", "amount", "memo", "paid", "sources"]));
        let merged = outcome.merged.iter().map(|row| {
            let mut cells = vec![
                row.key.as_str().to_string(),
                key_kind(&row.key).to_string(),
                flag(row.canonical_id),
            ];
            cells.extend(attribute_cells(&row.attributes));
            cells.extend([
                opt(&row.raw),
                opt(&row.amount),
                opt(&row.memo),
                flag(row.paid),
                row.sources.join("; "),
            ]);
            cells
        });
        let merged_path = self.write_rows(&dir, "merged.csv", header, merged)?;

        let duplicates = outcome.duplicates.iter().map(|d| {
            vec![
                d.member_id.clone(),
                opt(&d.region),
                opt(&d.name),
                d.source.clone(),
                d.row.to_string(),
                opt(&d.raw),
                opt(&d.amount),
                opt(&d.memo),
            ]
        });
        let duplicates_path = self.write_rows(
            &dir,
            "duplicates.csv",
            strings(&["member_id", "region", "name", "source", "row", "raw", "amount", "memo"]),
            duplicates,
        )?;

        Ok(vec![merged_path, duplicates_path])
    }

    fn write_annual(&self, export: &AnnualExport<'_>) -> Result<Vec<PathBuf>> {
        let dir = self.target(export.name);
        let mut written = Vec::new();

        let mut header = strings(&["member_key", "key_kind", "canonical_id"]);
        header.extend(strings(&ATTRIBUTE_HEADERS));
        header.extend(strings(&["attendance_exempt", "last_period", "source"]));
        let profiles = export.outcome.profiles.values().map(|p| {
            let mut cells = vec![
                p.key.as_str().to_string(),
                key_kind(&p.key).to_string(),
                flag(p.key.has_canonical_format()),
            ];
            cells.extend(attribute_cells(&p.attributes));
            cells.extend([flag(p.attendance_exempt), p.last_period.to_string(), p.source.clone()]);
            cells
        });
        written.push(self.write_rows(&dir, "profiles.csv", header, profiles)?);

        let ledger = export.outcome.ledger.iter().map(|e| {
            vec![
                e.key.as_str().to_string(),
                e.period.to_string(),
                opt(&e.raw),
                opt(&e.amount),
                flag(e.paid),
                opt(&e.memo),
                e.source.clone(),
                opt(&e.region),
                opt(&e.department),
            ]
        });
        written.push(self.write_rows(
            &dir,
            "ledger.csv",
            strings(&[
                "member_key", "period", "raw", "amount", "paid", "memo", "source", "region", "department",
            ]),
            ledger,
        )?);

        let table = &export.report.table;
        let mut header = vec![table.group_by.to_string()];
        header.extend((1..=12).map(|m| format!("{:02}", m)));
        header.push("average".to_string());
        let rows = table.rows.iter().chain(table.summary.iter()).map(aggregate_cells);
        written.push(self.write_rows(&dir, "aggregate.csv", header, rows)?);

        let mut header = strings(&["member_key", "region", "department", "name_local", "name_latin"]);
        for m in 1..=12 {
            header.push(format!("{:02}", m));
            header.push(format!("{:02}_memo", m));
        }
        let detail = export.detail.iter().map(|row| {
            let mut cells = vec![
                row.key.as_str().to_string(),
                opt(&row.attributes.region),
                opt(&row.attributes.department),
                opt(&row.attributes.name_local),
                opt(&row.attributes.name_latin),
            ];
            for cell in &row.months {
                cells.push(opt(&cell.raw));
                cells.push(opt(&cell.memo));
            }
            cells
        });
        written.push(self.write_rows(&dir, "detail.csv", header, detail)?);

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DuplicateRow, MergedRow};
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn merged(id: &str, amount: i64) -> MergedRow {
        MergedRow {
            key: MemberKey::ByUniqueCode(id.into()),
            canonical_id: false,
            attributes: MemberAttributes {
                region: Some("North".into()),
                ..Default::default()
            },
            raw: Some(amount.to_string()),
            amount: Some(Decimal::from(amount)),
            memo: None,
            paid: true,
            sources: vec!["a.csv".into(), "b.csv".into()],
        }
    }

    #[test]
    fn test_write_batch_files() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        let outcome = BatchOutcome {
            merged: vec![merged("A", 1000)],
            duplicates: vec![DuplicateRow {
                member_id: "A".into(),
                region: None,
                name: None,
                source: "a.csv".into(),
                row: 3,
                raw: Some("1000".into()),
                amount: Some(Decimal::from(1000)),
                memo: None,
            }],
        };

        let paths = sink.write_batch("merged-2024.03", &outcome).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(sink.target("merged-2024.03").join("merged.csv").exists());

        let content = fs::read_to_string(&paths[0]).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("member_key,key_kind,canonical_id,region"));
        assert_eq!(lines.next().unwrap(), "A,code,no,North,,,,,,,1000,1000,,yes,a.csv; b.csv");

        let dups = fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(dups.lines().count(), 2);
    }
}
