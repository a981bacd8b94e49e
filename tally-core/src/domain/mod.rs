//! Core domain entities
//!
//! Pure data structures and pure functions - no I/O.

pub mod amount;
pub mod header;
mod ledger;
mod member;
mod period;
mod report;
pub mod result;
mod source;

pub use amount::{is_paid, normalize_amount};
pub use header::{normalize_header, CanonicalField};
pub use ledger::{Ledger, LedgerEntry};
pub use member::{is_canonical_id, CanonicalProfile, MemberAttributes, MemberKey, PaymentValue, Snapshot};
pub use period::Period;
pub use report::{
    AggregateRow, AggregateTable, AnnualReport, BatchOutcome, DetailRow, DuplicateRow, GroupBy,
    MergedRow, MonthCell, PeriodSummary, PeriodSummaryRow,
};
pub use source::{RawSheet, SourceContent, SourceFailure, SourceItem, SourceLoad};
