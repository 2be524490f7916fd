//! Custom error types for backhaul
//!
//! This module defines the error hierarchy for the orchestrator using
//! thiserror for ergonomic error definitions. The variants map directly onto
//! the pipeline stages: configuration errors abort before a run starts,
//! workspace/export/archive errors abort a run in flight, and prune errors
//! are surfaced as warnings without failing the run.

use std::time::Duration;

use thiserror::Error;

/// Why a single database export failed
#[derive(Error, Debug)]
pub enum ExportCause {
    /// The dump tool exceeded the configured time limit and was killed
    #[error("dump tool timed out after {0:?}")]
    Timeout(Duration),

    /// The dump tool ran to completion but reported failure
    #[error("dump tool failed ({status}): {stderr}")]
    ToolFailure { status: String, stderr: String },

    /// Spawning the tool or writing the dump file failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// The main error type for backhaul operations
#[derive(Error, Debug)]
pub enum BackhaulError {
    /// Settings file missing, unreadable, or failing validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// The per-run staging directory could not be created
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// A database export failed; fatal to the run under the fail-fast policy
    #[error("Export of '{alias}' failed: {cause}")]
    Export { alias: String, cause: ExportCause },

    /// Packing the staging directory into an archive failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// The retention pass could not complete; never fatal to a run
    #[error("Prune error: {0}")]
    Prune(String),

    /// File I/O outside the stages above
    #[error("I/O error: {0}")]
    Io(String),

    /// The run was cancelled by an external signal
    #[error("Run interrupted")]
    Interrupted,
}

impl BackhaulError {
    /// Create an export error for a target
    pub fn export(alias: impl Into<String>, cause: ExportCause) -> Self {
        Self::Export {
            alias: alias.into(),
            cause,
        }
    }

    /// Whether this error aborts a run (prune failures do not)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Prune(_))
    }
}

impl From<std::io::Error> for BackhaulError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackhaulError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for backhaul operations
pub type BackhaulResult<T> = Result<T, BackhaulError>;
