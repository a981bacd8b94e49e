//! Tally CLI - reconcile monthly member payment records in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{annual, batch, columns, config, logs, merge, parse_text, summary};
use tally_core::{GroupBy, Period};

/// Tally - reconcile monthly member payment records
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one batch of same-month files and report duplicates
    Merge {
        /// Folder (or single file) holding the batch
        folder: PathBuf,
        /// Directory to write results into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Output name (defaults to the configured pattern)
        #[arg(long)]
        name: Option<String>,
        /// Output format (csv, duckdb)
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge every YYYY.MM subfolder of a root folder in parallel
    Batch {
        /// Root folder containing YYYY.MM subfolders
        root: PathBuf,
        /// Directory to write results into (defaults to the root)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of worker threads
        #[arg(short, long, env = "TALLY_WORKERS")]
        workers: Option<usize>,
        /// Output format (csv, duckdb)
        #[arg(long, default_value = "csv")]
        format: String,
        /// Rewrite outputs that already exist
        #[arg(long)]
        overwrite: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build profiles, the ledger and annual statistics across months
    Annual {
        /// Folder holding monthly files or YYYY.MM subfolders
        path: PathBuf,
        /// Grouping for the statistics table
        #[arg(long, default_value = "region")]
        group_by: GroupBy,
        /// Directory to write results into (prints only when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output name
        #[arg(long, default_value = "annual")]
        name: String,
        /// Output format (csv, duckdb)
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show paid/unpaid counts for one month
    Summary {
        /// Folder holding monthly files or YYYY.MM subfolders
        path: PathBuf,
        /// Month to summarize (YYYY.MM)
        #[arg(long)]
        period: Period,
        /// Grouping for the summary rows
        #[arg(long, default_value = "region")]
        group_by: GroupBy,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract records from a free-form text file
    ParseText {
        /// Text file to parse
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview header detection and column mapping for a file
    Columns {
        /// Table or workbook to inspect
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Merge { .. } => "merge",
            Commands::Batch { .. } => "batch",
            Commands::Annual { .. } => "annual",
            Commands::Summary { .. } => "summary",
            Commands::ParseText { .. } => "parse-text",
            Commands::Columns { .. } => "columns",
            Commands::Config { .. } => "config",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The log database is opened per use; commands may open it themselves
    let command = cli.command.name();
    if let Some(logger) = commands::get_logger() {
        let _ = logger.log_command(command);
    }

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::log_event(
                &commands::get_logger(),
                tally_core::LogEvent::new("command_failed")
                    .with_command(command)
                    .with_error(e.to_string())
                    .with_error_details(format!("{:?}", e)),
            );
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Merge { folder, output, name, format, json } => merge::run(&folder, &output, name, &format, json),
        Commands::Batch { root, output, workers, format, overwrite, json } => {
            batch::run(&root, output, workers, &format, overwrite, json)
        }
        Commands::Annual { path, group_by, output, name, format, json } => {
            annual::run(&path, group_by, output, &name, &format, json)
        }
        Commands::Summary { path, period, group_by, json } => summary::run(&path, period, group_by, json),
        Commands::ParseText { file, json } => parse_text::run(&file, json),
        Commands::Columns { file, json } => columns::run(&file, json),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
