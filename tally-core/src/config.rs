//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "aliases": { "amount": ["금액", "십일조", "sum"] },
//!   "substringFallbacks": { "memo": ["비고"] },
//!   "requiredFields": ["member_id", "region", "amount"],
//!   "headerScanRows": 20,
//!   "attendanceExemptMarkers": ["출결제외"],
//!   "textEncodings": ["utf-8", "euc-kr", "windows-1251"],
//!   "workers": 4,
//!   "outputPattern": "merged-{period}"
//! }
//! ```
//! Every key is optional. Keys this crate does not know are kept on save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::CanonicalField;
use crate::services::batch::{BatchRunner, DEFAULT_OUTPUT_PATTERN, DEFAULT_WORKERS};
use crate::services::ingest::IngestService;
use crate::services::merge::{TemporalMerge, DEFAULT_EXEMPT_MARKERS};
use crate::services::schema::{AliasTable, SchemaResolver, DEFAULT_HEADER_SCAN_ROWS, MAX_HEADER_SCAN_ROWS};
use crate::services::text_parser::{TextParser, DEFAULT_TEXT_ENCODINGS};

pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable overriding the worker count
pub const WORKERS_ENV: &str = "TALLY_WORKERS";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    aliases: BTreeMap<CanonicalField, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    substring_fallbacks: BTreeMap<CanonicalField, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required_fields: Option<Vec<CanonicalField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header_scan_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attendance_exempt_markers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_encodings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_pattern: Option<String>,
    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

impl SettingsFile {
    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }
}

/// Effective configuration: settings file merged over built-in defaults
#[derive(Debug, Clone)]
pub struct Config {
    /// Exact-match label overrides per field
    pub aliases: BTreeMap<CanonicalField, Vec<String>>,
    /// Substring fallback overrides per field
    pub substring_fallbacks: BTreeMap<CanonicalField, Vec<String>>,
    /// Required fields; `None` keeps the built-in set
    pub required_fields: Option<Vec<CanonicalField>>,
    pub header_scan_rows: usize,
    pub attendance_exempt_markers: Vec<String>,
    pub text_encodings: Vec<String>,
    pub workers: usize,
    pub output_pattern: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(SettingsFile::default(), None)
    }
}

impl Config {
    pub fn settings_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    /// Load settings from the data directory.
    ///
    /// A missing file means defaults. The worker count can be overridden with
    /// `TALLY_WORKERS`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = SettingsFile::read(&Self::settings_path(data_dir))?;
        let workers_env = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());
        Ok(Self::from_settings(raw, workers_env))
    }

    fn from_settings(raw: SettingsFile, workers_env: Option<usize>) -> Self {
        let non_empty = |list: &Option<Vec<String>>| list.clone().filter(|l| !l.is_empty());
        Self {
            aliases: raw.aliases.clone(),
            substring_fallbacks: raw.substring_fallbacks.clone(),
            required_fields: raw.required_fields.clone().filter(|r| !r.is_empty()),
            header_scan_rows: raw
                .header_scan_rows
                .unwrap_or(DEFAULT_HEADER_SCAN_ROWS)
                .clamp(1, MAX_HEADER_SCAN_ROWS),
            attendance_exempt_markers: non_empty(&raw.attendance_exempt_markers)
                .unwrap_or_else(|| DEFAULT_EXEMPT_MARKERS.iter().map(|m| m.to_string()).collect()),
            text_encodings: non_empty(&raw.text_encodings)
                .unwrap_or_else(|| DEFAULT_TEXT_ENCODINGS.iter().map(|e| e.to_string()).collect()),
            workers: workers_env.or(raw.workers).unwrap_or(DEFAULT_WORKERS).max(1),
            output_pattern: raw
                .output_pattern
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATTERN.to_string()),
            _raw_settings: raw,
        }
    }

    /// Settings as they would be written, unknown keys included
    fn to_settings(&self) -> SettingsFile {
        SettingsFile {
            aliases: self.aliases.clone(),
            substring_fallbacks: self.substring_fallbacks.clone(),
            required_fields: self.required_fields.clone(),
            header_scan_rows: Some(self.header_scan_rows),
            attendance_exempt_markers: Some(self.attendance_exempt_markers.clone()),
            text_encodings: Some(self.text_encodings.clone()),
            workers: Some(self.workers),
            output_pattern: Some(self.output_pattern.clone()),
            other: self._raw_settings.other.clone(),
        }
    }

    /// Write settings, keeping keys this crate does not manage
    pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(data_dir)?;
        let path = Self::settings_path(data_dir);

        let existing = SettingsFile::read(&path).unwrap_or_default();
        let mut settings = self.to_settings();
        for (key, value) in existing.other {
            settings.other.entry(key).or_insert(value);
        }

        std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
        Ok(path)
    }

    /// Pretty JSON of the effective settings
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_settings())?)
    }

    /// Spell out the built-in alias table so it can be edited
    pub fn with_default_aliases(mut self) -> Self {
        let table = AliasTable::default();
        for entry in table.entries() {
            self.aliases.entry(entry.field).or_insert_with(|| entry.aliases.clone());
            if !entry.substrings.is_empty() {
                self.substring_fallbacks
                    .entry(entry.field)
                    .or_insert_with(|| entry.substrings.clone());
            }
        }
        if self.required_fields.is_none() {
            self.required_fields = Some(table.required().map(|e| e.field).collect());
        }
        self
    }

    /// Built-in alias table with the configured overrides applied
    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::default();
        for (field, aliases) in &self.aliases {
            table.set_aliases(*field, aliases);
        }
        for (field, substrings) in &self.substring_fallbacks {
            table.set_substrings(*field, substrings);
        }
        if let Some(required) = &self.required_fields {
            table.set_required(required);
        }
        table
    }

    pub fn ingest_service(&self) -> IngestService {
        IngestService::new(
            SchemaResolver::new(self.alias_table()),
            TextParser::new(self.text_encodings.clone()),
            self.header_scan_rows,
        )
    }

    pub fn temporal_merge(&self) -> TemporalMerge {
        TemporalMerge::new(self.attendance_exempt_markers.clone())
    }

    pub fn batch_runner(&self) -> BatchRunner {
        BatchRunner::new(self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalize_header;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::from_settings(SettingsFile::read(&Config::settings_path(dir.path())).unwrap(), None);
        assert_eq!(config.header_scan_rows, DEFAULT_HEADER_SCAN_ROWS);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.attendance_exempt_markers, vec!["출결제외"]);
        assert_eq!(config.output_pattern, "merged-{period}");
        assert_eq!(config.alias_table(), AliasTable::default());
    }

    #[test]
    fn test_overrides_apply_to_alias_table() {
        let dir = tempdir().unwrap();
        std::fs::write(
            Config::settings_path(dir.path()),
            r#"{
                "aliases": { "amount": ["Sum Paid"] },
                "requiredFields": ["member_id", "amount"],
                "headerScanRows": 500
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.header_scan_rows, MAX_HEADER_SCAN_ROWS);

        let table = config.alias_table();
        let amount = table.get(CanonicalField::Amount).unwrap();
        assert_eq!(amount.aliases, vec![normalize_header("Sum Paid")]);
        let required: Vec<CanonicalField> = table.required().map(|e| e.field).collect();
        assert_eq!(required, vec![CanonicalField::MemberId, CanonicalField::Amount]);
    }

    #[test]
    fn test_worker_env_override_wins() {
        let raw = SettingsFile {
            workers: Some(2),
            ..Default::default()
        };
        assert_eq!(Config::from_settings(raw.clone(), Some(8)).workers, 8);
        assert_eq!(Config::from_settings(raw, None).workers, 2);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(Config::settings_path(dir.path()), r#"{ "aliases": { "salary": ["x"] } }"#).unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            Config::settings_path(dir.path()),
            r#"{ "theme": "dark", "workers": 3 }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.output_pattern = "tithe-{period}".to_string();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(Config::settings_path(dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["outputPattern"], "tithe-{period}");
    }

    #[test]
    fn test_with_default_aliases_round_trips() {
        let dir = tempdir().unwrap();
        Config::default().with_default_aliases().save(dir.path()).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.alias_table(), AliasTable::default());
    }
}
