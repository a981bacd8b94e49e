//! Members, their per-period snapshots and the canonical profile

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::{is_paid, normalize_amount};
use super::header::CanonicalField;
use super::period::Period;

static CANONICAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}-\d{5}$").expect("valid identifier regex"));

/// Whether a token has the `NNNNNNNN-NNNNN` shape of an issued identifier
pub fn is_canonical_id(token: &str) -> bool {
    CANONICAL_ID_RE.is_match(token)
}

/// Identity of a member.
///
/// The unique code is preferred; rows without one fall back to their
/// display name, collapsed to single spaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemberKey {
    ByUniqueCode(String),
    ByDisplayName(String),
}

impl MemberKey {
    /// Pick the identity for a row, or `None` when it has neither an
    /// identifier nor a name.
    pub fn resolve(id: Option<&str>, name: Option<&str>) -> Option<Self> {
        if let Some(id) = id.map(str::trim).filter(|s| !s.is_empty()) {
            return Some(Self::ByUniqueCode(id.to_string()));
        }
        let name = name
            .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|n| !n.is_empty())?;
        Some(Self::ByDisplayName(name))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ByUniqueCode(s) | Self::ByDisplayName(s) => s,
        }
    }

    /// Unique codes in the issued `NNNNNNNN-NNNNN` shape. Name keys never are.
    pub fn has_canonical_format(&self) -> bool {
        match self {
            Self::ByUniqueCode(code) => is_canonical_id(code),
            Self::ByDisplayName(_) => false,
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive attributes of a member. Every value may change between periods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAttributes {
    pub region: Option<String>,
    pub team: Option<String>,
    pub zone: Option<String>,
    pub department: Option<String>,
    pub name_local: Option<String>,
    pub name_latin: Option<String>,
    pub attendance: Option<String>,
}

impl MemberAttributes {
    /// Value of an attribute field; identifier and payment fields have none
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Region => self.region.as_deref(),
            CanonicalField::Team => self.team.as_deref(),
            CanonicalField::Zone => self.zone.as_deref(),
            CanonicalField::Department => self.department.as_deref(),
            CanonicalField::NameLocal => self.name_local.as_deref(),
            CanonicalField::NameLatin => self.name_latin.as_deref(),
            CanonicalField::Attendance => self.attendance.as_deref(),
            CanonicalField::MemberId | CanonicalField::Amount | CanonicalField::Memo => None,
        }
    }

    /// Set an attribute field. Blank values are stored as `None`.
    pub fn set(&mut self, field: CanonicalField, value: Option<String>) {
        let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let slot = match field {
            CanonicalField::Region => &mut self.region,
            CanonicalField::Team => &mut self.team,
            CanonicalField::Zone => &mut self.zone,
            CanonicalField::Department => &mut self.department,
            CanonicalField::NameLocal => &mut self.name_local,
            CanonicalField::NameLatin => &mut self.name_latin,
            CanonicalField::Attendance => &mut self.attendance,
            CanonicalField::MemberId | CanonicalField::Amount | CanonicalField::Memo => return,
        };
        *slot = value;
    }

    /// Name to show for the member, local script first
    pub fn display_name(&self) -> Option<&str> {
        self.name_local.as_deref().or(self.name_latin.as_deref())
    }

    /// Whether the attendance cell carries any of the exemption markers
    pub fn is_attendance_exempt(&self, markers: &[String]) -> bool {
        self.attendance
            .as_deref()
            .is_some_and(|value| markers.iter().any(|m| !m.is_empty() && value.contains(m.as_str())))
    }
}

/// The payment cell of one row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentValue {
    pub raw: Option<String>,
    pub amount: Option<Decimal>,
    pub memo: Option<String>,
    pub paid: bool,
}

impl PaymentValue {
    /// Normalize a raw cell and derive the paid flag
    pub fn from_raw(raw: Option<String>, memo: Option<String>) -> Self {
        let raw = raw.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let memo = memo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        let amount = raw.as_deref().and_then(normalize_amount);
        let paid = is_paid(raw.as_deref(), amount);
        Self { raw, amount, memo, paid }
    }

    /// Whether the cell holds a number
    pub fn has_amount(&self) -> bool {
        self.amount.is_some()
    }
}

/// One row of one input, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub key: MemberKey,
    pub attributes: MemberAttributes,
    pub payment: PaymentValue,
    /// Label of the input the row came from
    pub source: String,
    /// 1-based row (sheet row or text line) the snapshot was read from
    pub row: usize,
}

/// Latest known state of a member across all observed periods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalProfile {
    pub key: MemberKey,
    pub attributes: MemberAttributes,
    pub attendance_exempt: bool,
    pub last_period: Period,
    pub source: String,
}
