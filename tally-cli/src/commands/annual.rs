//! Annual command - profiles, ledger and monthly statistics for one year

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use tally_core::ports::AnnualExport;
use tally_core::{GroupBy, OperationResult};

use super::{get_context, get_logger, make_sink, print_envelope, report_rejected};
use crate::output;

pub fn run(
    path: &Path,
    group_by: GroupBy,
    output_dir: Option<PathBuf>,
    name: &str,
    format: &str,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let sink = output_dir.as_deref().map(|dir| make_sink(format, dir)).transpose()?;

    let run = ctx.pipeline.annual(&ctx.source(path), group_by)?;
    report_rejected(&logger, &run.ingest.rejected, None, json);

    let outputs = match &sink {
        Some(sink) if !run.ingest.accepted.is_empty() => sink.write_annual(&AnnualExport {
            name,
            outcome: &run.outcome,
            report: &run.report,
            detail: &run.detail,
        })?,
        _ => Vec::new(),
    };

    if json {
        let data = serde_json::json!({
            "target_year": run.report.target_year,
            "years_seen": run.report.years_seen,
            "members": run.outcome.profiles.len(),
            "ledger_entries": run.outcome.ledger.len(),
            "periods": run.outcome.periods.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            "undated": run.outcome.undated,
            "table": run.report.table,
            "outputs": outputs,
        });
        let undated = run.outcome.undated_errors().map(|e| e.to_string());
        return print_envelope(OperationResult::ok(data).with_warnings(undated), &run.ingest.rejected);
    }

    if run.ingest.accepted.is_empty() {
        output::warning(&format!("No usable sources in {}", path.display()));
        return Ok(());
    }

    for error in run.outcome.undated_errors() {
        output::warning(&error.to_string());
    }

    println!(
        "{} members, {} ledger entries over {} months",
        run.outcome.profiles.len(),
        run.outcome.ledger.len(),
        run.outcome.periods.len()
    );

    match run.report.target_year {
        Some(year) if !run.report.table.is_empty() => {
            println!();
            println!("{}", format!("Payment ratio by {} in {} (%)", group_by, year).bold());
            let mut table = output::create_table();
            table.set_header(output::month_header(&group_by.to_string()));
            for row in &run.report.table.rows {
                table.add_row(output::aggregate_cells(row));
            }
            if let Some(summary) = &run.report.table.summary {
                table.add_row(output::aggregate_cells(summary));
            }
            println!("{}", table);
        }
        Some(year) => output::info(&format!("No counted members in {}", year)),
        None if run.report.years_seen.is_empty() => output::warning("No dated inputs; statistics skipped"),
        None => {
            let years: Vec<String> = run.report.years_seen.iter().map(|y| y.to_string()).collect();
            output::warning(&format!(
                "Inputs span several years ({}); statistics need a single year",
                years.join(", ")
            ));
        }
    }

    if !outputs.is_empty() {
        println!();
        for path in &outputs {
            println!("  {} {}", "wrote".dimmed(), path.display());
        }
    }

    Ok(())
}
