//! Batch command - merge every month folder under a root

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tally_core::services::batch::discover_month_folders;
use tally_core::services::{BatchRunner, FolderStatus, JobStatus, SubfolderMerge};

use super::{get_context, get_logger, make_sink, report_rejected};
use crate::output;

pub fn run(
    root: &Path,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    format: &str,
    overwrite: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let output_dir = output_dir.unwrap_or_else(|| root.to_path_buf());
    let sink = make_sink(format, &output_dir)?;
    let runner = workers.map(BatchRunner::new).unwrap_or_else(|| ctx.config.batch_runner());

    let folders = discover_month_folders(root)?;
    if folders.is_empty() {
        if json {
            println!("[]");
        } else {
            output::warning(&format!("No YYYY.MM folders found in {}", root.display()));
        }
        return Ok(());
    }

    let pb = if json {
        ProgressBar::hidden()
    } else {
        output::info(&format!(
            "Merging {} folders with {} workers",
            folders.len(),
            runner.workers()
        ));
        ProgressBar::new(folders.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
    );

    let job = SubfolderMerge::new(ctx.pipeline.ingest_service(), sink.as_ref())
        .with_output_pattern(ctx.config.output_pattern.clone())
        .with_overwrite(overwrite);
    let reports = job.run(root, &runner, |name, status| match status {
        JobStatus::Started => pb.set_message(name.to_string()),
        JobStatus::Finished | JobStatus::Failed => pb.inc(1),
    })?;
    pb.finish_with_message("done");

    for report in &reports {
        report_rejected(&logger, &report.rejected, Some(report.period), json);
        if report.status == FolderStatus::Failed {
            if let Some(l) = &logger {
                let error = report.error.as_deref().unwrap_or("unknown error");
                let _ = l.log_batch_failure(&report.folder, report.period, error);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Folder", "Status", "Sources", "Members", "Duplicates", "Rejected", "Detail"]);
    for report in &reports {
        let status = match report.status {
            FolderStatus::Saved => "saved".green().to_string(),
            FolderStatus::Skipped => "skipped".yellow().to_string(),
            FolderStatus::Failed => "failed".red().to_string(),
        };
        let detail = match &report.error {
            Some(error) => error.clone(),
            None => report
                .outputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        };
        table.add_row(vec![
            report.folder.clone(),
            status,
            report.sources.to_string(),
            report.merged.to_string(),
            report.duplicates.to_string(),
            report.rejected.len().to_string(),
            detail,
        ]);
    }
    println!("{}", table);

    let failed = reports.iter().filter(|r| r.status == FolderStatus::Failed).count();
    if failed > 0 {
        output::warning(&format!("{} of {} folders failed", failed, reports.len()));
    } else {
        output::success(&format!("Processed {} folders", reports.len()));
    }

    Ok(())
}
