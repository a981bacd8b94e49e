//! Output structures handed to export collaborators

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::member::{MemberAttributes, MemberKey};
use super::period::Period;
use super::result::Error;

/// A valued snapshot of a member that has more than one valued snapshot in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub member_id: String,
    pub region: Option<String>,
    pub name: Option<String>,
    pub source: String,
    pub row: usize,
    pub raw: Option<String>,
    pub amount: Option<Decimal>,
    pub memo: Option<String>,
}

/// One member of a single-batch merge, fields filled from the first row that has them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRow {
    pub key: MemberKey,
    pub canonical_id: bool,
    pub attributes: MemberAttributes,
    pub raw: Option<String>,
    pub amount: Option<Decimal>,
    pub memo: Option<String>,
    pub paid: bool,
    pub sources: Vec<String>,
}

/// Result of merging one batch of same-period inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub merged: Vec<MergedRow>,
    pub duplicates: Vec<DuplicateRow>,
}

/// Organizational dimension statistics are grouped by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Region,
    Department,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Region => "region",
            GroupBy::Department => "department",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "region" => Ok(GroupBy::Region),
            "department" | "dept" => Ok(GroupBy::Department),
            other => Err(Error::validation(format!(
                "Unknown grouping '{}', expected region or department",
                other
            ))),
        }
    }
}

/// One labelled row of twelve monthly ratios (percent, one decimal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub label: String,
    pub months: [f64; 12],
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    pub group_by: GroupBy,
    pub rows: Vec<AggregateRow>,
    /// Mean of the rows above; absent when there are no rows
    pub summary: Option<AggregateRow>,
}

impl AggregateTable {
    pub fn empty(group_by: GroupBy) -> Self {
        Self {
            group_by,
            rows: Vec::new(),
            summary: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Annual statistics plus the year guard.
///
/// `target_year` is set only when every dated input falls in one year;
/// otherwise the table is empty and `years_seen` lists the conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualReport {
    pub target_year: Option<i32>,
    pub years_seen: BTreeSet<i32>,
    pub table: AggregateTable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCell {
    pub raw: Option<String>,
    pub memo: Option<String>,
}

/// A member's year at a glance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub key: MemberKey,
    pub attributes: MemberAttributes,
    pub months: [MonthCell; 12],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummaryRow {
    pub label: String,
    pub total: usize,
    pub paid: usize,
    pub unpaid: usize,
    pub ratio: f64,
    pub paid_sum: Decimal,
}

/// Single-month counts per group, with a totals row recomputed from the counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub group_by: GroupBy,
    pub rows: Vec<PeriodSummaryRow>,
    pub totals: PeriodSummaryRow,
}
