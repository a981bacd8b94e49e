//! Parse-text command - extract records from a free-form text file

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tally_core::services::TextParseStatus;
use tally_core::LogEvent;

use super::{get_context, get_logger, log_event};
use crate::output;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let outcome = ctx.pipeline.ingest_service().text_parser().parse_bytes(&bytes);

    if outcome.status != TextParseStatus::Parsed {
        log_event(
            &get_logger(),
            LogEvent::new("source_rejected")
                .with_source(file.display().to_string())
                .with_error(format!("{:?}", outcome.status)),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome.status {
        TextParseStatus::Parsed => {}
        TextParseStatus::NoRecords => {
            output::warning("No records found");
            return Ok(());
        }
        TextParseStatus::NoCanonicalIdentifier => {
            output::warning(&format!(
                "Discarded {} lines: none carries an identifier like 00000000-00000",
                outcome.extracted
            ));
            return Ok(());
        }
    }

    let mut table = output::create_table();
    table.set_header(vec!["Line", "Member", "Name", "Amount", "Memo", "Strategy"]);
    for record in &outcome.records {
        table.add_row(vec![
            record.line.to_string(),
            record.member_id.clone(),
            record.name.clone().unwrap_or_default(),
            record.raw.clone().unwrap_or_default(),
            record.memo.clone().unwrap_or_default(),
            format!("{:?}", record.strategy).to_lowercase(),
        ]);
    }
    println!("{}", table);
    println!(
        "{} records ({} {})",
        outcome.records.len(),
        "encoding".dimmed(),
        outcome.encoding
    );

    Ok(())
}
