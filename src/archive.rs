//! Archive creation
//!
//! Packs the staging workspace's contents (not the directory entry itself)
//! into a single gzip-compressed tar file and restricts access to the owning
//! user. The archive is assembled under a staging name and renamed into place
//! so an aborted run never leaves a half-written archive at the final path.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::error::{BackhaulError, BackhaulResult};

/// Result of a successful archive step
#[derive(Debug)]
pub struct ArchiveOutcome {
    /// Final archive path
    pub path: PathBuf,
    /// Archive size in bytes
    pub size_bytes: u64,
    /// Whether owner-only permissions were applied
    pub hardened: bool,
}

/// Pack the direct contents of `workspace` into a tar.gz at `dest`
///
/// Content integrity failures are errors; a permission-set failure alone is
/// reported through [`ArchiveOutcome::hardened`] so the caller can surface a
/// warning without failing the run.
pub fn archive(workspace: &Path, dest: &Path) -> BackhaulResult<ArchiveOutcome> {
    let staged = staged_path(dest);

    if let Err(e) = pack(workspace, &staged) {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }

    fs::rename(&staged, dest).map_err(|e| {
        let _ = fs::remove_file(&staged);
        BackhaulError::Archive(format!("Failed to move archive into place: {}", e))
    })?;

    let size_bytes = fs::metadata(dest)
        .map_err(|e| BackhaulError::Archive(format!("Failed to stat archive: {}", e)))?
        .len();

    let hardened = match restrict_permissions(dest) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %dest.display(), "failed to restrict archive permissions: {}", e);
            false
        }
    };

    info!(path = %dest.display(), size_bytes, "archive created");

    Ok(ArchiveOutcome {
        path: dest.to_path_buf(),
        size_bytes,
        hardened,
    })
}

fn pack(workspace: &Path, staged: &Path) -> BackhaulResult<()> {
    let file = File::create(staged)
        .map_err(|e| BackhaulError::Archive(format!("Failed to create archive file: {}", e)))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut entries = fs::read_dir(workspace)
        .map_err(|e| {
            BackhaulError::Archive(format!(
                "Failed to read workspace {}: {}",
                workspace.display(),
                e
            ))
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BackhaulError::Archive(format!("Failed to read workspace entry: {}", e)))?;

    // Deterministic entry order regardless of directory iteration order
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| BackhaulError::Archive(format!("Failed to stat {}: {}", path.display(), e)))?;
        // The workspace holds only dump files
        if !file_type.is_file() {
            continue;
        }

        builder
            .append_path_with_name(&path, entry.file_name())
            .map_err(|e| {
                BackhaulError::Archive(format!(
                    "Failed to add {} to archive: {}",
                    path.display(),
                    e
                ))
            })?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| BackhaulError::Archive(format!("Failed to finish archive: {}", e)))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| BackhaulError::Archive(format!("Failed to finish compression: {}", e)))?;
    writer
        .flush()
        .map_err(|e| BackhaulError::Archive(format!("Failed to flush archive: {}", e)))?;

    Ok(())
}

/// `<dest>.part`, renamed to `dest` only after the tar stream is complete
fn staged_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Owner read/write only; dumps routinely contain credentials and PII
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
