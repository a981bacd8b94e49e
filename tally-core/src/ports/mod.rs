//! Port definitions (hexagonal architecture)
//!
//! The core reads inputs and hands results to collaborators only through
//! these traits. Concrete readers and writers live in `adapters`.

mod sink;
mod source;

pub use sink::{AnnualExport, ReportSink};
pub use source::SourceProvider;
