//! Per-run staging workspace
//!
//! Each backup run stages its dump files in a uniquely named temporary
//! directory under the backup directory. The directory name carries a random
//! suffix so concurrent runs on the same host cannot collide, and removal is
//! tied to the value's lifetime so it happens on every exit path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{BackhaulError, BackhaulResult};

/// Filename prefix shared by all staging directories
pub const WORKSPACE_PREFIX: &str = "backup_temp_";

/// A staging directory that is removed when the value is dropped
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named staging directory under `base_dir`
    ///
    /// `base_dir` is created first if it does not exist yet.
    pub fn create(base_dir: &Path) -> BackhaulResult<Self> {
        std::fs::create_dir_all(base_dir).map_err(|e| {
            BackhaulError::Workspace(format!(
                "Failed to create backup directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base_dir)
            .map_err(|e| {
                BackhaulError::Workspace(format!(
                    "Failed to create staging directory in {}: {}",
                    base_dir.display(),
                    e
                ))
            })?;

        debug!(path = %dir.path().display(), "staging workspace created");
        Ok(Self { dir })
    }

    /// The workspace directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for one target's dump file inside the workspace
    pub fn dump_path(&self, alias: &str) -> PathBuf {
        self.dir.path().join(format!("{}.sql", alias))
    }

    /// Remove the workspace now instead of waiting for drop
    ///
    /// Removal failures are logged, not propagated: by this point the run's
    /// outcome is already decided and a leftover directory must not change it.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), "failed to remove staging workspace: {}", e);
        } else {
            debug!(path = %path.display(), "staging workspace removed");
        }
    }
}
