//! Adapter implementations
//!
//! Concrete I/O behind the port traits:
//! - `FolderSource` reads folders, single files and zip archives
//! - `CsvSink` and `DuckDbSink` write merge results
//! - `spreadsheet` turns workbook and CSV bytes into raw sheets

pub mod csv_export;
pub mod duckdb;
pub mod filesystem;
pub mod spreadsheet;

pub use csv_export::CsvSink;
pub use self::duckdb::DuckDbSink;
pub use filesystem::FolderSource;
