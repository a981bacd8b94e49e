//! Source provider port - where raw inputs come from

use crate::domain::result::Result;
use crate::domain::SourceLoad;

/// Produces the raw inputs of one run.
///
/// A provider reports unreadable inputs inside the returned `SourceLoad`
/// instead of failing; `Err` is reserved for the case where nothing at all
/// could be listed (e.g. the root folder is missing).
pub trait SourceProvider: Send + Sync {
    /// Short description used in logs (e.g. the folder path)
    fn name(&self) -> &str;

    /// Read every input
    fn load(&self) -> Result<SourceLoad>;
}
