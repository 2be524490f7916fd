//! Database export adapters
//!
//! Wraps the external dump capability behind a narrow trait so the pipeline
//! can be exercised in tests with an injected fake. The shipped
//! implementation drives a mysqldump-compatible tool as a child process.

use std::path::Path;

use crate::error::ExportCause;
use crate::targets::Target;

pub mod mysql;

pub use mysql::MysqlExporter;

/// Produces a dump file for one target
pub trait Exporter {
    /// Export `target` to `dest`
    ///
    /// On failure no partial file may remain at `dest`; the pipeline relies
    /// on this to never archive a truncated dump.
    fn export(&self, target: &Target, dest: &Path) -> Result<(), ExportCause>;
}
