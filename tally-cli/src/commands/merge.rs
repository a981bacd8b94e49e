//! Merge command - one batch of same-month files

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tally_core::{OperationResult, Period};

use super::{get_context, get_logger, make_sink, print_envelope, report_rejected};
use crate::output;

pub fn run(folder: &Path, output_dir: &Path, name: Option<String>, format: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let sink = make_sink(format, output_dir)?;

    let period = folder
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(Period::from_stem)
        .or_else(|| Period::infer(folder));
    let name = name.unwrap_or_else(|| match period {
        Some(p) => ctx.config.output_pattern.replace("{period}", &p.to_string()),
        None => folder
            .file_name()
            .map(|s| format!("merged-{}", s.to_string_lossy()))
            .unwrap_or_else(|| "merged".to_string()),
    });

    let run = ctx.pipeline.batch(&ctx.source(folder))?;
    report_rejected(&logger, &run.ingest.rejected, period, json);

    if run.ingest.accepted.is_empty() {
        let message = format!("No usable sources in {}", folder.display());
        if json {
            return print_envelope(OperationResult::<()>::fail(message), &run.ingest.rejected);
        }
        output::warning(&message);
        return Ok(());
    }

    let outputs = sink.write_batch(&name, &run.outcome)?;

    if json {
        let data = serde_json::json!({
            "name": name,
            "period": period.map(|p| p.to_string()),
            "sources": run.ingest.accepted.len(),
            "merged": run.outcome.merged.len(),
            "duplicates": run.outcome.duplicates,
            "outputs": outputs,
        });
        return print_envelope(OperationResult::ok(data), &run.ingest.rejected);
    }

    output::success(&format!(
        "Merged {} members from {} sources",
        run.outcome.merged.len(),
        run.ingest.accepted.len()
    ));

    if run.outcome.duplicates.is_empty() {
        println!("No duplicates found.");
    } else {
        println!();
        println!("{}", format!("Duplicates ({} rows)", run.outcome.duplicates.len()).bold());
        let mut table = output::create_table();
        table.set_header(vec!["Member", "Region", "Name", "Source", "Row", "Amount", "Memo"]);
        for dup in &run.outcome.duplicates {
            table.add_row(vec![
                dup.member_id.clone(),
                dup.region.clone().unwrap_or_default(),
                dup.name.clone().unwrap_or_default(),
                dup.source.clone(),
                dup.row.to_string(),
                dup.raw.clone().unwrap_or_default(),
                dup.memo.clone().unwrap_or_default(),
            ]);
        }
        println!("{}", table);
    }

    println!();
    for path in &outputs {
        println!("  {} {}", "wrote".dimmed(), path.display());
    }

    Ok(())
}
