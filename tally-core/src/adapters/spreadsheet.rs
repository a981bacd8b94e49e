//! Spreadsheet and delimited-text readers
//!
//! Everything is read into `RawSheet`s of plain strings; header detection and
//! column mapping happen later in the core.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::domain::result::{Error, Result};
use crate::domain::RawSheet;
use crate::services::text_parser::decode_text;

/// Workbook formats calamine can open
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Render a cell the way it was typed.
///
/// Whole floats lose their trailing `.0` so identifiers and amounts stored as
/// numbers read back as `1000`, not `1000.0`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Read every sheet of a workbook held in memory
pub fn read_workbook(label: &str, bytes: Vec<u8>) -> Result<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::validation(format!("{}: cannot open workbook: {}", label, e)))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::validation(format!("{}: cannot read sheet '{}': {}", label, name, e)))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        sheets.push(RawSheet::new(name, rows));
    }
    Ok(sheets)
}

/// Read a CSV or TSV file, decoding it with the configured encodings first
pub fn read_delimited(label: &str, bytes: &[u8], delimiter: u8, encodings: &[String]) -> Result<RawSheet> {
    let (text, _) = decode_text(bytes, encodings);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::validation(format!("{}: {}", label, e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawSheet::new(label, rows))
}
