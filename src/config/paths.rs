//! Path management for backhaul
//!
//! Provides XDG-compliant resolution of the configuration directory.
//!
//! ## Path Resolution Order
//!
//! 1. `BACKHAUL_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/backhaul` or `~/.config/backhaul`
//! 3. Windows: `%APPDATA%\backhaul`

use std::path::PathBuf;

use crate::error::BackhaulError;

/// Manages the configuration paths used by backhaul
#[derive(Debug, Clone)]
pub struct BackhaulPaths {
    /// Base directory for configuration
    base_dir: PathBuf,
}

impl BackhaulPaths {
    /// Create a new BackhaulPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, BackhaulError> {
        let base_dir = if let Ok(custom) = std::env::var("BACKHAUL_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create BackhaulPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base configuration directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure the configuration directory exists
    pub fn ensure_directories(&self) -> Result<(), BackhaulError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| BackhaulError::Io(format!("Failed to create config directory: {}", e)))?;

        Ok(())
    }

    /// Check if backhaul has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default configuration directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, BackhaulError> {
    // Unix (Linux/macOS): Use XDG_CONFIG_HOME if set, otherwise ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .map_err(|_| BackhaulError::Config("HOME environment variable not set".into()))
        })?;
    Ok(config_base.join("backhaul"))
}

/// Resolve the default configuration directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, BackhaulError> {
    // Windows: Use APPDATA
    let appdata = std::env::var("APPDATA")
        .map_err(|_| BackhaulError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("backhaul"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackhaulPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackhaulPaths::with_base_dir(temp_dir.path().join("nested").join("config"));

        paths.ensure_directories().unwrap();

        assert!(paths.base_dir().exists());
    }

    #[test]
    fn test_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackhaulPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert!(!paths.is_initialized());
        std::fs::write(paths.settings_file(), "{}").unwrap();
        assert!(paths.is_initialized());
    }
}
