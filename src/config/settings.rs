//! Settings for backhaul
//!
//! Manages the operator-maintained configuration: the backup target fleet,
//! archive directory, retention window, dump tool invocation parameters, and
//! the notification channel.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackhaulError, BackhaulResult};
use crate::targets::{Target, TargetRegistry};

/// Notification channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Webhook endpoint that receives run notifications
    #[serde(default)]
    pub webhook_url: String,

    /// Delivery attempts before giving up on a notification
    #[serde(default = "default_notify_attempts")]
    pub max_attempts: u32,

    /// Seconds added to the delay after each failed delivery attempt
    #[serde(default = "default_notify_backoff")]
    pub backoff_secs: u64,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            max_attempts: default_notify_attempts(),
            backoff_secs: default_notify_backoff(),
        }
    }
}

/// User settings for backhaul
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory receiving finished archives and hosting run workspaces
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Host used when a target does not name one
    #[serde(default = "default_host")]
    pub default_host: String,

    /// Days an archive may age before the pruner removes it
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Dump tool binary invoked once per target
    #[serde(default = "default_dump_tool")]
    pub dump_tool: String,

    /// Seconds a single export may run before it is killed
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    /// Archive the successful dumps even when some targets fail
    #[serde(default)]
    pub allow_partial: bool,

    /// Notification channel
    #[serde(default)]
    pub notify: NotifySettings,

    /// Backup target fleet
    #[serde(default)]
    pub targets: Vec<Target>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/backups/backhaul")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_dump_tool() -> String {
    "mysqldump".to_string()
}

fn default_export_timeout() -> u64 {
    3600
}

fn default_notify_attempts() -> u32 {
    3
}

fn default_notify_backoff() -> u64 {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_dir: default_backup_dir(),
            default_host: default_host(),
            retention_days: default_retention_days(),
            dump_tool: default_dump_tool(),
            export_timeout_secs: default_export_timeout(),
            allow_partial: false,
            notify: NotifySettings::default(),
            targets: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from disk
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing or malformed.
    pub fn load(path: &Path) -> BackhaulResult<Self> {
        if !path.exists() {
            return Err(BackhaulError::Config(format!(
                "Settings file not found: {} (run 'backhaul init' to create one)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| BackhaulError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            BackhaulError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(settings)
    }

    /// Load settings from disk, or fall back to defaults if the file is absent
    pub fn load_or_default(path: &Path) -> BackhaulResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to disk atomically (write to temp, then rename)
    pub fn save(&self, path: &Path) -> BackhaulResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BackhaulError::Io(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Temp file in the same directory so the rename stays atomic
        let temp_path = path.with_extension("json.tmp");

        let file = File::create(&temp_path)
            .map_err(|e| BackhaulError::Io(format!("Failed to create temp file: {}", e)))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| BackhaulError::Config(format!("Failed to serialize settings: {}", e)))?;

        writer
            .flush()
            .map_err(|e| BackhaulError::Io(format!("Failed to flush settings: {}", e)))?;

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            BackhaulError::Io(format!("Failed to rename temp file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the settings required before a backup run may start
    ///
    /// The notification channel is checked here because a run that cannot
    /// report its own failures must not start; this error goes to stderr only.
    pub fn validate(&self) -> BackhaulResult<()> {
        if self.notify.webhook_url.trim().is_empty() {
            return Err(BackhaulError::Config(
                "notify.webhook_url is not set; refusing to run without a notification channel"
                    .into(),
            ));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(BackhaulError::Config("backup_dir is not set".into()));
        }
        if self.retention_days == 0 {
            return Err(BackhaulError::Config(
                "retention_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Build the validated target registry from the configured fleet
    pub fn build_registry(&self) -> BackhaulResult<TargetRegistry> {
        TargetRegistry::new(self.targets.clone())
    }

    /// Maximum archive age as a duration
    pub fn retention_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 86_400)
    }

    /// Export time limit as a duration
    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }
}
