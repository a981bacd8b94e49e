//! Summary command - paid/unpaid counts for one month

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tally_core::{GroupBy, Period};

use super::{get_context, get_logger, report_rejected};
use crate::output;

pub fn run(path: &Path, period: Period, group_by: GroupBy, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    let run = ctx.pipeline.summary(&ctx.source(path), period, group_by)?;
    report_rejected(&logger, &run.ingest.rejected, Some(period), json);

    if json {
        println!("{}", serde_json::to_string_pretty(&run.summary)?);
        return Ok(());
    }

    if !run.outcome.periods.contains(&period) {
        output::warning(&format!("No inputs found for {}", period));
        return Ok(());
    }

    println!("{}", format!("{} by {}", period, group_by).bold());
    let mut table = output::create_table();
    let label = group_by.to_string();
    table.set_header(vec![label.as_str(), "Total", "Paid", "Unpaid", "Ratio %", "Paid sum"]);
    for row in run.summary.rows.iter().chain(std::iter::once(&run.summary.totals)) {
        table.add_row(vec![
            comfy_table::Cell::new(&row.label),
            output::number(row.total),
            output::number(row.paid),
            output::number(row.unpaid),
            output::percent(row.ratio),
            output::number(row.paid_sum),
        ]);
    }
    println!("{}", table);

    Ok(())
}
