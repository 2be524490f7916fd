//! Retention pruning
//!
//! Scans the archive directory for files matching the archive naming
//! convention and deletes every one strictly older than the retention
//! window, judged by filesystem mtime alone. Only direct entries are
//! considered; the scan never recurses.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::error::{BackhaulError, BackhaulResult};

/// Suffix shared by every archive this tool produces
pub const ARCHIVE_SUFFIX: &str = "-backup.tar.gz";

/// Timestamp format of the archive filename stem (and of run ids)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Whether a directory entry name matches the archive naming convention
pub fn is_archive_name(name: &str) -> bool {
    match name.strip_suffix(ARCHIVE_SUFFIX) {
        Some(stem) => NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT).is_ok(),
        None => false,
    }
}

/// Delete archives in `archive_dir` strictly older than `max_age`
///
/// Individual deletion failures do not abort the scan; every candidate is
/// visited and the failures are aggregated into a single error afterwards.
/// Returns the number of archives deleted.
pub fn prune(archive_dir: &Path, max_age: Duration) -> BackhaulResult<usize> {
    if !archive_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut deleted = 0usize;
    let mut failures: Vec<String> = Vec::new();

    let entries = fs::read_dir(archive_dir).map_err(|e| {
        BackhaulError::Prune(format!("Failed to read {}: {}", archive_dir.display(), e))
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(format!("unreadable directory entry: {}", e));
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        if !is_archive_name(&name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                failures.push(format!("{}: {}", name, e));
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                failures.push(format!("{}: {}", name, e));
                continue;
            }
        };

        // A future mtime yields age zero, which keeps the file
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            debug!(archive = %name, "within retention window");
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(archive = %name, "pruned expired archive");
                deleted += 1;
            }
            Err(e) => {
                warn!(archive = %name, "failed to delete expired archive: {}", e);
                failures.push(format!("{}: {}", name, e));
            }
        }
    }

    if failures.is_empty() {
        Ok(deleted)
    } else {
        Err(BackhaulError::Prune(format!(
            "{} archive(s) could not be removed ({} deleted): {}",
            failures.len(),
            deleted,
            failures.join("; ")
        )))
    }
}
