//! Schema resolution - map noisy column labels to canonical fields
//!
//! Every lookup goes through an explicit [`AliasTable`]. Exact matches on
//! normalized labels are tried first for all fields; fields that stay
//! unresolved then fall back to substring matching over the columns nobody
//! claimed yet.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{normalize_header, CanonicalField};

/// Default number of leading rows searched for a header
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;

/// Hard ceiling on header scanning
pub const MAX_HEADER_SCAN_ROWS: usize = 100;

/// Minimum number of required fields a header row must name
const MIN_HEADER_HITS: usize = 2;

/// Labels that identify one canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldAliases {
    pub field: CanonicalField,
    /// Normalized labels matched exactly, in priority order
    pub aliases: Vec<String>,
    /// Normalized fragments matched inside labels when no alias matched
    pub substrings: Vec<String>,
    pub required: bool,
}

impl FieldAliases {
    fn new(field: CanonicalField, aliases: &[&str], substrings: &[&str], required: bool) -> Self {
        Self {
            field,
            aliases: aliases.iter().map(|a| normalize_header(a)).collect(),
            substrings: substrings.iter().map(|s| normalize_header(s)).collect(),
            required,
        }
    }
}

/// Ordered alias table, one entry per canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasTable {
    entries: Vec<FieldAliases>,
}

impl Default for AliasTable {
    fn default() -> Self {
        use CanonicalField::*;
        Self {
            entries: vec![
                FieldAliases::new(
                    MemberId,
                    &["고유번호", "id", "memberid", "member_id", "uid", "номер", "идентификатор"],
                    &["고유번호"],
                    true,
                ),
                FieldAliases::new(Region, &["지역", "region", "регион"], &[], true),
                FieldAliases::new(Team, &["팀", "국가", "team", "country", "страна"], &[], false),
                FieldAliases::new(Zone, &["구역", "zone", "area", "зона"], &[], false),
                FieldAliases::new(Department, &["부서", "department", "dept", "отдел"], &[], false),
                FieldAliases::new(
                    NameLocal,
                    &["이름(KR)", "이름", "name", "name(kr)", "전체명단", "성명"],
                    &["이름(kr)"],
                    false,
                ),
                FieldAliases::new(
                    NameLatin,
                    &["이름(RU)", "name(ru)", "name(en)", "имя", "фио"],
                    &["이름(ru)"],
                    false,
                ),
                FieldAliases::new(Attendance, &["출결여부", "attendance"], &["출결", "attendance"], false),
                FieldAliases::new(
                    Amount,
                    &["금액", "십일조", "amount", "tithe", "сумма", "десятина"],
                    &["십일조", "금액", "amount", "сумма"],
                    true,
                ),
                FieldAliases::new(
                    Memo,
                    &["메모", "memo", "note", "notes", "비고", "미납사유", "примечание"],
                    &["메모", "미납사유", "memo"],
                    false,
                ),
            ],
        }
    }
}

impl AliasTable {
    pub fn entries(&self) -> &[FieldAliases] {
        &self.entries
    }

    pub fn get(&self, field: CanonicalField) -> Option<&FieldAliases> {
        self.entries.iter().find(|e| e.field == field)
    }

    /// Replace the exact-match labels of a field
    pub fn set_aliases(&mut self, field: CanonicalField, aliases: &[String]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.field == field) {
            entry.aliases = aliases.iter().map(|a| normalize_header(a)).collect();
        }
    }

    /// Replace the substring fallbacks of a field
    pub fn set_substrings(&mut self, field: CanonicalField, substrings: &[String]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.field == field) {
            entry.substrings = substrings.iter().map(|s| normalize_header(s)).collect();
        }
    }

    /// Mark exactly the given fields as required
    pub fn set_required(&mut self, fields: &[CanonicalField]) {
        for entry in &mut self.entries {
            entry.required = fields.contains(&entry.field);
        }
    }

    pub fn required(&self) -> impl Iterator<Item = &FieldAliases> {
        self.entries.iter().filter(|e| e.required)
    }
}

/// Index of the leftmost column whose normalized label equals one of the
/// aliases. Aliases are tried in order, so an earlier alias beats a column
/// further left that only matches a later one.
pub fn find_column(columns: &[String], aliases: &[String]) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
    aliases.iter().find_map(|alias| {
        let alias = normalize_header(alias);
        normalized.iter().position(|c| !alias.is_empty() && *c == alias)
    })
}

/// Index of the leftmost unclaimed column whose normalized label contains a needle
pub fn find_column_containing(
    columns: &[String],
    needles: &[String],
    claimed: &BTreeSet<usize>,
) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
    needles.iter().find_map(|needle| {
        let needle = normalize_header(needle);
        if needle.is_empty() {
            return None;
        }
        normalized
            .iter()
            .enumerate()
            .find(|(idx, c)| !claimed.contains(idx) && c.contains(&needle))
            .map(|(idx, _)| idx)
    })
}

/// Field → column assignment for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub columns: Vec<String>,
    pub fields: BTreeMap<CanonicalField, usize>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    /// Trimmed, non-empty cell of a data row for a field
    pub fn cell<'a>(&self, row: &'a [String], field: CanonicalField) -> Option<&'a str> {
        let idx = self.get(field)?;
        row.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// Original label of the column mapped to a field
    pub fn label(&self, field: CanonicalField) -> Option<&str> {
        self.get(field)
            .and_then(|idx| self.columns.get(idx))
            .map(String::as_str)
    }
}

/// Where the header sits in a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderLocation {
    /// Index of the first header row
    pub row: usize,
    /// 1 for a plain header, 2 for a header merged over two rows
    pub span: usize,
    pub columns: Vec<String>,
    /// Number of required fields named by the header
    pub hits: usize,
}

impl HeaderLocation {
    /// Index of the first data row
    pub fn data_start(&self) -> usize {
        self.row + self.span
    }
}

/// Resolves table headers against an alias table
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    table: AliasTable,
}

impl SchemaResolver {
    pub fn new(table: AliasTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Map every field the columns name.
    ///
    /// Fails with [`Error::SchemaResolution`] listing all unresolved required
    /// fields; a partial mapping is never returned.
    pub fn resolve(&self, label: &str, columns: &[String]) -> Result<ColumnMapping> {
        let mut fields = BTreeMap::new();
        let mut claimed = BTreeSet::new();

        for entry in self.table.entries() {
            if let Some(idx) = find_column(columns, &entry.aliases) {
                if claimed.insert(idx) {
                    fields.insert(entry.field, idx);
                }
            }
        }

        for entry in self.table.entries() {
            if fields.contains_key(&entry.field) || entry.substrings.is_empty() {
                continue;
            }
            if let Some(idx) = find_column_containing(columns, &entry.substrings, &claimed) {
                claimed.insert(idx);
                fields.insert(entry.field, idx);
            }
        }

        let missing: Vec<String> = self
            .table
            .required()
            .filter(|e| !fields.contains_key(&e.field))
            .map(|e| e.field.key().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::schema(label, missing));
        }

        Ok(ColumnMapping {
            columns: columns.to_vec(),
            fields,
        })
    }

    /// Find the header row among the first `scan_limit` rows.
    ///
    /// Each row, and each pair of adjacent rows joined cell by cell, is scored
    /// by how many required fields it names exactly. A pair is a candidate only
    /// when it names more fields than either of its rows. The best score wins;
    /// ties go to the earlier row, and a single row beats a pair starting at
    /// the same index. Returns `None` when no candidate names at least two
    /// required fields.
    pub fn detect_header(&self, rows: &[Vec<String>], scan_limit: usize) -> Option<HeaderLocation> {
        let limit = scan_limit.clamp(1, MAX_HEADER_SCAN_ROWS).min(rows.len());
        let required: Vec<&FieldAliases> = self.table.required().collect();

        let singles: Vec<usize> = rows[..limit].iter().map(|r| score(r, &required)).collect();

        let mut best: Option<HeaderLocation> = None;
        for idx in 0..limit {
            let mut candidates = vec![(1, rows[idx].clone(), singles[idx])];
            if idx + 1 < limit {
                let joined = join_rows(&rows[idx], &rows[idx + 1]);
                let hits = score(&joined, &required);
                // A pair only counts when joining names more than either row alone
                if hits > singles[idx].max(singles[idx + 1]) {
                    candidates.push((2, joined, hits));
                }
            }
            for (span, columns, hits) in candidates {
                if hits >= MIN_HEADER_HITS && best.as_ref().map_or(true, |b| hits > b.hits) {
                    best = Some(HeaderLocation {
                        row: idx,
                        span,
                        columns,
                        hits,
                    });
                }
            }
        }
        best
    }
}

fn score(columns: &[String], required: &[&FieldAliases]) -> usize {
    required
        .iter()
        .filter(|entry| find_column(columns, &entry.aliases).is_some())
        .count()
}

/// Cell-wise concatenation of two header rows
fn join_rows(top: &[String], bottom: &[String]) -> Vec<String> {
    let width = top.len().max(bottom.len());
    (0..width)
        .map(|i| {
            let a = top.get(i).map(|s| s.trim()).unwrap_or("");
            let b = bottom.get(i).map(|s| s.trim()).unwrap_or("");
            format!("{}{}", a, b)
        })
        .collect()
}
