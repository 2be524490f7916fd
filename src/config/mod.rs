//! Configuration module for backhaul
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (JSON, atomic writes)
//! - Pre-run validation

pub mod paths;
pub mod settings;

pub use paths::BackhaulPaths;
pub use settings::{NotifySettings, Settings};
