//! Logs command - inspect and prune the local event log (logs.duckdb)

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Local, TimeZone};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use tally_core::services::logging::now_ms;
use tally_core::{EntryPoint, LogEntry, LoggingService};

use super::get_tally_dir;
use crate::output;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show the newest entries
    List {
        /// How many entries to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Only rejected sources, failed folders and failed commands
        #[arg(long)]
        errors: bool,
        #[arg(long)]
        json: bool,
    },
    /// Delete entries older than a number of days
    Clear {
        #[arg(long, default_value = "30")]
        days: u64,
        /// Do not ask for confirmation
        #[arg(long, short = 'f')]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Entry counts and where the log lives
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file
    Export {
        /// Destination path
        destination: PathBuf,
    },
}

pub fn run(command: LogsCommands) -> Result<()> {
    let dir = get_tally_dir();
    std::fs::create_dir_all(&dir)?;
    let service = LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))?;

    match command {
        LogsCommands::List { limit, errors, json } => list(&service, limit, errors, json),
        LogsCommands::Clear { days, force, json } => clear(&service, days, force, json),
        LogsCommands::Stats { json } => stats(&service, json),
        LogsCommands::Export { destination } => {
            let path = service.export(&destination)?;
            output::success(&format!("Log copied to {}", path.display()));
            Ok(())
        }
    }
}

fn local_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn list(service: &LoggingService, limit: usize, errors_only: bool, json: bool) -> Result<()> {
    let entries = if errors_only {
        service.get_errors(limit)?
    } else {
        service.get_recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        output::info("The log is empty");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["When", "Event", "Command", "Source", "Period", "Error"]);
    for entry in &entries {
        table.add_row(vec![
            local_time(entry.timestamp),
            entry.event.clone(),
            entry.command.clone().unwrap_or_default(),
            entry.source.clone().unwrap_or_default(),
            entry.period.clone().unwrap_or_default(),
            entry.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    // Errors can fall outside a short listing; point at the newest ones.
    if !errors_only && !entries.iter().any(is_error) {
        let latest: Vec<LogEntry> = service.get_errors(3)?;
        if !latest.is_empty() {
            println!();
            println!("{}", "Latest errors".red().bold());
            for entry in &latest {
                println!(
                    "  {} {} {}",
                    local_time(entry.timestamp).dimmed(),
                    entry.source.as_deref().or(entry.command.as_deref()).unwrap_or(&entry.event),
                    entry.error_message.as_deref().unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

fn is_error(entry: &LogEntry) -> bool {
    entry.error_message.is_some()
}

fn clear(service: &LoggingService, days: u64, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove log entries older than {} days?", days))
            .default(false)
            .interact()?;
        if !confirmed {
            output::info("Nothing removed");
            return Ok(());
        }
    }

    let removed = service.delete_before(now_ms() - days as i64 * DAY_MS)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": removed }));
    } else {
        output::success(&format!("Removed {} entries", removed));
    }
    Ok(())
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn stats(service: &LoggingService, json: bool) -> Result<()> {
    let total = service.count()?;
    let errors = service.count_errors()?;
    let path = service.db_path();

    if json {
        let value = serde_json::json!({
            "entries": total,
            "errors": errors,
            "path": path,
            "size_bytes": file_size(path),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.add_row(vec!["Entries".to_string(), total.to_string()]);
    table.add_row(vec!["Errors".to_string(), errors.to_string()]);
    table.add_row(vec!["File".to_string(), path.display().to_string()]);
    table.add_row(vec!["Size".to_string(), format!("{} bytes", file_size(path))]);
    println!("{}", table);
    Ok(())
}
