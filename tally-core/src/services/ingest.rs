//! Ingest service - turn raw source items into snapshots
//!
//! Tables go through header detection and schema resolution; text files go
//! through the free-text parser. A failing source is rejected on its own and
//! never affects the others.

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{
    CanonicalField, MemberAttributes, MemberKey, PaymentValue, Period, RawSheet, Snapshot,
    SourceContent, SourceFailure, SourceItem, SourceLoad,
};
use crate::services::schema::{ColumnMapping, SchemaResolver, DEFAULT_HEADER_SCAN_ROWS};
use crate::services::text_parser::{TextParseStatus, TextParser};

const ATTRIBUTE_FIELDS: [CanonicalField; 7] = [
    CanonicalField::Region,
    CanonicalField::Team,
    CanonicalField::Zone,
    CanonicalField::Department,
    CanonicalField::NameLocal,
    CanonicalField::NameLatin,
    CanonicalField::Attendance,
];

/// Snapshots read from one source
#[derive(Debug, Clone, Serialize)]
pub struct IngestedSource {
    pub label: String,
    pub period: Option<Period>,
    pub snapshots: Vec<Snapshot>,
    /// Data rows dropped for having neither identifier nor name
    pub skipped_rows: usize,
}

/// Outcome of ingesting a whole load
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub accepted: Vec<IngestedSource>,
    pub rejected: Vec<SourceFailure>,
}

impl IngestReport {
    /// All snapshots in source order
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.accepted.iter().flat_map(|s| s.snapshots.iter())
    }

    pub fn snapshot_count(&self) -> usize {
        self.accepted.iter().map(|s| s.snapshots.len()).sum()
    }
}

/// Converts source items into snapshots
#[derive(Debug, Clone)]
pub struct IngestService {
    resolver: SchemaResolver,
    text_parser: TextParser,
    header_scan_rows: usize,
}

impl Default for IngestService {
    fn default() -> Self {
        Self::new(SchemaResolver::default(), TextParser::default(), DEFAULT_HEADER_SCAN_ROWS)
    }
}

impl IngestService {
    pub fn new(resolver: SchemaResolver, text_parser: TextParser, header_scan_rows: usize) -> Self {
        Self {
            resolver,
            text_parser,
            header_scan_rows,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    pub fn text_parser(&self) -> &TextParser {
        &self.text_parser
    }

    /// Ingest every item of a load, keeping provider failures as rejections
    pub fn ingest_load(&self, load: SourceLoad) -> IngestReport {
        let mut report = IngestReport {
            accepted: Vec::new(),
            rejected: load.failures,
        };
        for item in &load.items {
            match self.ingest(item) {
                Ok(source) => report.accepted.push(source),
                Err(e) => report.rejected.push(SourceFailure {
                    label: item.label.clone(),
                    error: e.to_string(),
                }),
            }
        }
        report
    }

    /// Ingest a single item
    pub fn ingest(&self, item: &SourceItem) -> Result<IngestedSource> {
        match &item.content {
            SourceContent::Table(sheets) => self.ingest_table(item, sheets),
            SourceContent::Text(bytes) => self.ingest_text(item, bytes),
        }
    }

    /// Locate the header of a sheet and map its columns.
    ///
    /// Falls back to the first row when no header scores high enough, so the
    /// resolver still reports which required fields are missing.
    pub fn map_sheet(&self, label: &str, sheet: &RawSheet) -> Result<(ColumnMapping, usize)> {
        let (columns, data_start) = match self.resolver.detect_header(&sheet.rows, self.header_scan_rows) {
            Some(header) => {
                let start = header.data_start();
                (header.columns, start)
            }
            None => (sheet.rows.first().cloned().unwrap_or_default(), 1),
        };
        let mapping = self.resolver.resolve(label, &columns)?;
        Ok((mapping, data_start))
    }

    fn ingest_table(&self, item: &SourceItem, sheets: &[RawSheet]) -> Result<IngestedSource> {
        let used: Vec<&RawSheet> = sheets.iter().filter(|s| !s.is_blank()).collect();
        if used.is_empty() {
            return Err(Error::validation(format!("{}: no data", item.label)));
        }

        let mut snapshots = Vec::new();
        let mut skipped_rows = 0;
        let mut first_error = None;
        let mut mapped_any = false;

        for sheet in &used {
            let label = if used.len() > 1 {
                format!("{} [{}]", item.label, sheet.name)
            } else {
                item.label.clone()
            };
            let (mapping, data_start) = match self.map_sheet(&label, sheet) {
                Ok(found) => found,
                Err(e) => {
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            mapped_any = true;

            for (idx, row) in sheet.rows.iter().enumerate().skip(data_start) {
                if row.iter().all(|c| c.trim().is_empty()) {
                    continue;
                }
                match snapshot_from_row(&mapping, row, &label, idx + 1) {
                    Some(snapshot) => snapshots.push(snapshot),
                    None => skipped_rows += 1,
                }
            }
        }

        if !mapped_any {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(IngestedSource {
            label: item.label.clone(),
            period: item.period,
            snapshots,
            skipped_rows,
        })
    }

    fn ingest_text(&self, item: &SourceItem, bytes: &[u8]) -> Result<IngestedSource> {
        let outcome = self.text_parser.parse_bytes(bytes);
        match outcome.status {
            TextParseStatus::Parsed => {}
            TextParseStatus::NoRecords => {
                return Err(Error::unrecognized(&item.label, "no recognizable lines"));
            }
            TextParseStatus::NoCanonicalIdentifier => {
                return Err(Error::unrecognized(
                    &item.label,
                    format!("{} lines without any NNNNNNNN-NNNNN identifier", outcome.extracted),
                ));
            }
        }

        let snapshots = outcome
            .records
            .into_iter()
            .map(|record| {
                let mut attributes = MemberAttributes::default();
                attributes.set(CanonicalField::NameLocal, record.name);
                Snapshot {
                    key: MemberKey::ByUniqueCode(record.member_id),
                    attributes,
                    payment: PaymentValue::from_raw(record.raw, record.memo),
                    source: item.label.clone(),
                    row: record.line,
                }
            })
            .collect();

        Ok(IngestedSource {
            label: item.label.clone(),
            period: item.period,
            snapshots,
            skipped_rows: 0,
        })
    }
}

fn snapshot_from_row(mapping: &ColumnMapping, row: &[String], label: &str, row_number: usize) -> Option<Snapshot> {
    let name = mapping
        .cell(row, CanonicalField::NameLocal)
        .or_else(|| mapping.cell(row, CanonicalField::NameLatin));
    let key = MemberKey::resolve(mapping.cell(row, CanonicalField::MemberId), name)?;

    let mut attributes = MemberAttributes::default();
    for field in ATTRIBUTE_FIELDS {
        attributes.set(field, mapping.cell(row, field).map(str::to_string));
    }

    let payment = PaymentValue::from_raw(
        mapping.cell(row, CanonicalField::Amount).map(str::to_string),
        mapping.cell(row, CanonicalField::Memo).map(str::to_string),
    );

    Some(Snapshot {
        key,
        attributes,
        payment,
        source: label.to_string(),
        row: row_number,
    })
}
