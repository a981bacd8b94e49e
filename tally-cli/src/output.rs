//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use tally_core::domain::AggregateRow;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Right-aligned numeric cell
pub fn number(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

/// Percentage with one decimal
pub fn percent(value: f64) -> Cell {
    number(format!("{:.1}", value))
}

/// Header for a label column followed by the twelve months and an average
pub fn month_header(label: &str) -> Vec<String> {
    let mut header = vec![label.to_string()];
    header.extend((1..=12).map(|m| format!("{:02}", m)));
    header.push("Avg".to_string());
    header
}

pub fn aggregate_cells(row: &AggregateRow) -> Vec<Cell> {
    let mut cells = vec![Cell::new(&row.label)];
    cells.extend(row.months.iter().map(|v| percent(*v)));
    cells.push(percent(row.average));
    cells
}
