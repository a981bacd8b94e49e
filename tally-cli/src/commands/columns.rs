//! Columns command - preview header detection and column mapping

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tally_core::domain::SourceContent;
use tally_core::ports::SourceProvider;
use tally_core::CanonicalField;

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct SheetPreview {
    source: String,
    sheet: String,
    /// 1-based row of the header, when one was found
    header_row: Option<usize>,
    header_span: usize,
    columns: BTreeMap<&'static str, String>,
    error: Option<String>,
}

pub fn run(file: &Path, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let ingest = ctx.pipeline.ingest_service();
    let load = ctx.source(file).load()?;

    let mut previews = Vec::new();
    for item in &load.items {
        let sheets = match &item.content {
            SourceContent::Table(sheets) => sheets,
            SourceContent::Text(_) => {
                if !json {
                    output::info(&format!("{} is a text file; try `tally parse-text`", item.label));
                }
                continue;
            }
        };

        for sheet in sheets.iter().filter(|s| !s.is_blank()) {
            let header = ingest.resolver().detect_header(&sheet.rows, ctx.config.header_scan_rows);
            let mut preview = SheetPreview {
                source: item.label.clone(),
                sheet: sheet.name.clone(),
                header_row: header.as_ref().map(|h| h.row + 1),
                header_span: header.as_ref().map_or(0, |h| h.span),
                columns: BTreeMap::new(),
                error: None,
            };
            match ingest.map_sheet(&item.label, sheet) {
                Ok((mapping, _)) => {
                    for field in CanonicalField::ALL {
                        if let Some(label) = mapping.label(field) {
                            preview.columns.insert(field.key(), label.to_string());
                        }
                    }
                }
                Err(e) => preview.error = Some(e.to_string()),
            }
            previews.push(preview);
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "sheets": previews,
                "failures": load.failures,
            }))?
        );
        return Ok(());
    }

    for failure in &load.failures {
        output::error(&format!("{}: {}", failure.label, failure.error));
    }

    for preview in &previews {
        println!();
        let header = match preview.header_row {
            Some(row) if preview.header_span > 1 => format!("header rows {}-{}", row, row + preview.header_span - 1),
            Some(row) => format!("header row {}", row),
            None => "no header detected".to_string(),
        };
        println!("{} [{}] {}", preview.source.bold(), preview.sheet, header.dimmed());

        if let Some(error) = &preview.error {
            output::error(&format!("  {}", error));
            continue;
        }

        let mut table = output::create_table();
        table.set_header(vec!["Field", "Column"]);
        for (field, label) in &preview.columns {
            table.add_row(vec![field.to_string(), label.clone()]);
        }
        println!("{}", table);
    }

    Ok(())
}
