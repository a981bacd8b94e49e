//! Raw inputs handed to the core by source providers

use serde::{Deserialize, Serialize};

use super::period::Period;

/// One sheet of cells, as read from a workbook or delimited file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Whether every cell is blank
    pub fn is_blank(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    /// Structured rows; the header row still has to be found
    Table(Vec<RawSheet>),
    /// Undecoded bytes of an unstructured text file
    Text(Vec<u8>),
}

/// A single input with its label and, if known, its period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub label: String,
    pub period: Option<Period>,
    pub content: SourceContent,
}

impl SourceItem {
    pub fn table(label: impl Into<String>, period: Option<Period>, sheets: Vec<RawSheet>) -> Self {
        Self {
            label: label.into(),
            period,
            content: SourceContent::Table(sheets),
        }
    }

    pub fn text(label: impl Into<String>, period: Option<Period>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            period,
            content: SourceContent::Text(bytes),
        }
    }
}

/// An input that could not be read at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub label: String,
    pub error: String,
}

/// Everything a provider produced: readable items plus per-input failures
#[derive(Debug, Default)]
pub struct SourceLoad {
    pub items: Vec<SourceItem>,
    pub failures: Vec<SourceFailure>,
}
