//! Errors raised while ingesting and exporting records

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// One or more required fields could not be mapped to a column.
    /// Only the offending source is rejected.
    #[error("{label}: missing required columns: {}", .missing.join(", "))]
    SchemaResolution { label: String, missing: Vec<String> },

    #[error("{label}: unrecognized text ({reason})")]
    UnrecognizedText { label: String, reason: String },

    /// The source's folder and file name carry no `YYYY.MM`; it stays out of the ledger
    #[error("{0}: no period in folder or file name; left out of the ledger")]
    PeriodUnrecoverable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn schema(label: impl Into<String>, missing: Vec<String>) -> Self {
        Self::SchemaResolution {
            label: label.into(),
            missing,
        }
    }

    /// Create an unrecognized text error
    pub fn unrecognized(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnrecognizedText {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// JSON envelope printed by the CLI for one run
///
/// `warnings` carries the per-input problems that did not stop the run,
/// such as rejected sources or undated files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    /// Append warnings, keeping any already present
    pub fn with_warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings.extend(warnings.into_iter().map(Into::into));
        self
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_missing_field() {
        let err = Error::schema("2024.03/north.csv", vec!["member_id".into(), "amount".into()]);
        let msg = err.to_string();
        assert!(msg.contains("2024.03/north.csv"));
        assert!(msg.contains("member_id, amount"));
    }

    #[test]
    fn test_unrecognized_text_names_the_source() {
        let err = Error::unrecognized("notes.txt", "no recognizable lines");
        assert_eq!(err.to_string(), "notes.txt: unrecognized text (no recognizable lines)");
    }

    #[test]
    fn test_envelope_keeps_warnings() {
        let result = OperationResult::ok(3)
            .with_warnings(vec!["a.csv: missing required columns: amount"])
            .with_warnings(["b.txt: unrecognized text (empty)".to_string()]);
        assert!(result.success);
        assert_eq!(result.data, Some(3));
        assert_eq!(result.warnings.len(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["warnings"][0], "a.csv: missing required columns: amount");
    }

    #[test]
    fn test_envelope_omits_empty_warnings() {
        let json = serde_json::to_value(OperationResult::ok("done")).unwrap();
        assert!(json.get("warnings").is_none());
        assert_eq!(json["error"], serde_json::Value::Null);
    }

    #[test]
    fn test_failed_result_from_error() {
        let err: Result<i32> = Err(Error::config("Unknown field 'total'"));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error.as_deref(), Some("Configuration error: Unknown field 'total'"));
    }
}
