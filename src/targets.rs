//! Backup targets
//!
//! Defines the static description of one database to back up and the
//! validated registry the pipeline iterates over. The registry is built once
//! from settings at process start and is immutable for the run's duration.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BackhaulError, BackhaulResult};

/// Connection secret, redacted in debug output and zeroed on drop
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Create a new credential
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the underlying secret
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One database to be backed up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique name, used as the dump filename stem
    pub alias: String,

    /// Database host; falls back to the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection user
    pub user: String,

    /// Connection secret
    pub credential: Credential,

    /// Database name to dump
    pub database: String,
}

fn default_port() -> u16 {
    3306
}

impl Target {
    /// The host to connect to, using `default` when the target names none
    pub fn host_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.host.as_deref().unwrap_or(default)
    }
}

/// The validated, ordered list of backup targets for a run
///
/// Iteration order matches the settings file so log output is deterministic.
#[derive(Debug)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Validate a target list and build the registry
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing/malformed fields or a
    /// duplicate alias. An empty list is valid (the run becomes a no-op).
    pub fn new(targets: Vec<Target>) -> BackhaulResult<Self> {
        let mut seen = HashSet::new();

        for target in &targets {
            validate_alias(&target.alias)?;

            if !seen.insert(target.alias.clone()) {
                return Err(BackhaulError::Config(format!(
                    "duplicate target alias '{}'",
                    target.alias
                )));
            }
            if target.user.trim().is_empty() {
                return Err(BackhaulError::Config(format!(
                    "target '{}' has no user",
                    target.alias
                )));
            }
            if target.credential.is_empty() {
                return Err(BackhaulError::Config(format!(
                    "target '{}' has no credential",
                    target.alias
                )));
            }
            if target.database.trim().is_empty() {
                return Err(BackhaulError::Config(format!(
                    "target '{}' has no database",
                    target.alias
                )));
            }
            if target.port == 0 {
                return Err(BackhaulError::Config(format!(
                    "target '{}' has an invalid port",
                    target.alias
                )));
            }
        }

        Ok(Self { targets })
    }

    /// The targets in configuration order
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of configured targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the fleet is empty
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// The alias becomes a filename stem, so restrict it to safe characters
fn validate_alias(alias: &str) -> BackhaulResult<()> {
    if alias.is_empty() {
        return Err(BackhaulError::Config("target with empty alias".into()));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BackhaulError::Config(format!(
            "target alias '{}' contains characters outside [A-Za-z0-9_-]",
            alias
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(alias: &str) -> Target {
        Target {
            alias: alias.to_string(),
            host: None,
            port: 3306,
            user: "backup".to_string(),
            credential: Credential::new("secret"),
            database: "app".to_string(),
        }
    }

    #[test]
    fn test_registry_preserves_order() {
        let registry =
            TargetRegistry::new(vec![target("zeta"), target("alpha"), target("mid")]).unwrap();
        let aliases: Vec<_> = registry.targets().iter().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_empty_registry_is_valid() {
        let registry = TargetRegistry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = TargetRegistry::new(vec![target("app"), target("app")]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut bad = target("app");
        bad.user = String::new();
        assert!(TargetRegistry::new(vec![bad]).is_err());

        let mut bad = target("app");
        bad.credential = Credential::new("");
        assert!(TargetRegistry::new(vec![bad]).is_err());

        let mut bad = target("app");
        bad.database = "  ".to_string();
        assert!(TargetRegistry::new(vec![bad]).is_err());

        let mut bad = target("app");
        bad.port = 0;
        assert!(TargetRegistry::new(vec![bad]).is_err());
    }

    #[test]
    fn test_alias_charset_enforced() {
        assert!(TargetRegistry::new(vec![target("ok_name-2")]).is_ok());
        assert!(TargetRegistry::new(vec![target("../evil")]).is_err());
        assert!(TargetRegistry::new(vec![target("has space")]).is_err());
        assert!(TargetRegistry::new(vec![target("")]).is_err());
    }

    #[test]
    fn test_host_fallback() {
        let mut t = target("app");
        assert_eq!(t.host_or("10.0.0.1"), "10.0.0.1");
        t.host = Some("db.internal".to_string());
        assert_eq!(t.host_or("10.0.0.1"), "db.internal");
    }

    #[test]
    fn test_credential_debug_redacted() {
        let c = Credential::new("hunter2");
        assert_eq!(format!("{:?}", c), "Credential(***)");
    }
}
