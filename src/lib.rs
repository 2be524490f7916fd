//! backhaul - scheduled backup orchestrator for MySQL database fleets
//!
//! This library provides the core functionality for the backhaul CLI. Each
//! run exports every configured database target to a dump file inside a
//! per-run staging workspace, bundles the dumps into a single timestamped
//! archive with owner-only permissions, prunes archives past the retention
//! window, and reports the outcome to an operator webhook.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `targets`: Backup target model and validated registry
//! - `workspace`: Per-run staging directory with guaranteed cleanup
//! - `export`: Dump tool adapters
//! - `archive`: tar.gz packing and permission hardening
//! - `prune`: Retention pruning
//! - `notify`: Operator notification channel
//! - `pipeline`: The run orchestrator tying the stages together
//!
//! # Example
//!
//! ```rust,ignore
//! use backhaul::config::Settings;
//! use backhaul::export::MysqlExporter;
//! use backhaul::notify::WebhookNotifier;
//! use backhaul::pipeline::BackupPipeline;
//!
//! let settings = Settings::load(&path)?;
//! settings.validate()?;
//! let registry = settings.build_registry()?;
//!
//! let exporter = MysqlExporter::from_settings(&settings);
//! let notifier = WebhookNotifier::new(&settings.notify)?;
//! let report = BackupPipeline::new(&settings, &registry, exporter, notifier).run()?;
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod notify;
pub mod pipeline;
pub mod prune;
pub mod targets;
pub mod workspace;

pub use error::{BackhaulError, BackhaulResult};
