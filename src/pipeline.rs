//! Backup run orchestration
//!
//! Drives one run through its stages: acquire the staging workspace, export
//! every target, pack the dumps into a single archive, prune expired
//! archives, and report the outcome. A failure in workspace acquisition,
//! export, or archival aborts the run (fail-fast: a partial backup set is
//! worse than none, because an operator must never be misled into trusting an
//! incomplete archive). A pruning failure only downgrades the run with a
//! warning. The workspace is released exactly once on every path out.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::archive::{self, ArchiveOutcome};
use crate::config::Settings;
use crate::error::{BackhaulError, BackhaulResult, ExportCause};
use crate::export::Exporter;
use crate::notify::{Notifier, Severity};
use crate::prune::{self, ARCHIVE_SUFFIX, TIMESTAMP_FORMAT};
use crate::targets::TargetRegistry;
use crate::workspace::Workspace;

/// One target's successful export
#[derive(Debug)]
pub struct ExportRecord {
    /// Target alias
    pub alias: String,
    /// Dump file inside the workspace
    pub dump_path: PathBuf,
    /// Dump size in bytes
    pub size_bytes: u64,
    /// Wall-clock export duration
    pub elapsed: Duration,
}

/// Summary of a completed run
#[derive(Debug)]
pub struct RunReport {
    /// Timestamp-derived run identifier
    pub run_id: String,
    /// The archive, absent for a no-op run
    pub archive: Option<ArchiveOutcome>,
    /// Per-target export records, in configuration order
    pub exported: Vec<ExportRecord>,
    /// Aliases skipped under the partial-backup option
    pub skipped: Vec<String>,
    /// Expired archives removed by the retention pass
    pub pruned: usize,
}

/// Orchestrates one backup run
pub struct BackupPipeline<'a, E, N> {
    settings: &'a Settings,
    registry: &'a TargetRegistry,
    exporter: E,
    notifier: N,
    cancel: Arc<AtomicBool>,
}

impl<'a, E: Exporter, N: Notifier> BackupPipeline<'a, E, N> {
    /// Create a pipeline over a validated registry
    pub fn new(
        settings: &'a Settings,
        registry: &'a TargetRegistry,
        exporter: E,
        notifier: N,
    ) -> Self {
        Self {
            settings,
            registry,
            exporter,
            notifier,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally controlled cancellation flag (signal handler)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the run
    ///
    /// Exactly one terminal notification is sent: Info on success (including
    /// the no-op case), Error on any fatal failure. The staging workspace is
    /// removed before this returns, whatever the outcome.
    pub fn run(&self) -> BackhaulResult<RunReport> {
        let run_id = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        info!(run_id = %run_id, targets = self.registry.len(), "backup run starting");

        let workspace = match Workspace::create(&self.settings.backup_dir) {
            Ok(ws) => ws,
            Err(e) => {
                error!(run_id = %run_id, "backup run failed: {}", e);
                self.notifier.notify(
                    Severity::Error,
                    &format!("Backup run {} failed: {}", run_id, e),
                );
                return Err(e);
            }
        };

        let outcome = self.execute(&run_id, &workspace);

        match &outcome {
            Ok(report) => {
                info!(run_id = %run_id, "backup run finished");
                self.notifier.notify(Severity::Info, &success_message(report));
            }
            Err(e) => {
                error!(run_id = %run_id, "backup run failed: {}", e);
                self.notifier.notify(
                    Severity::Error,
                    &format!("Backup run {} failed: {}", run_id, e),
                );
            }
        }

        workspace.close();
        outcome
    }

    fn execute(&self, run_id: &str, workspace: &Workspace) -> BackhaulResult<RunReport> {
        if self.registry.is_empty() {
            info!("no targets configured; nothing to export");
            return Ok(RunReport {
                run_id: run_id.to_string(),
                archive: None,
                exported: Vec::new(),
                skipped: Vec::new(),
                pruned: 0,
            });
        }

        let (exported, skipped) = self.export_all(workspace)?;

        self.check_cancelled()?;

        let archive_path = self
            .settings
            .backup_dir
            .join(format!("{}{}", run_id, ARCHIVE_SUFFIX));
        let outcome = archive::archive(workspace.path(), &archive_path)?;
        if !outcome.hardened {
            self.notifier.notify(
                Severity::Warning,
                &format!(
                    "Archive {} was created but its permissions could not be restricted",
                    outcome.path.display()
                ),
            );
        }

        let pruned = match prune::prune(&self.settings.backup_dir, self.settings.retention_age()) {
            Ok(count) => count,
            Err(e) => {
                warn!("{}", e);
                self.notifier.notify(Severity::Warning, &e.to_string());
                0
            }
        };

        Ok(RunReport {
            run_id: run_id.to_string(),
            archive: Some(outcome),
            exported,
            skipped,
            pruned,
        })
    }

    fn export_all(&self, workspace: &Workspace) -> BackhaulResult<(Vec<ExportRecord>, Vec<String>)> {
        let mut exported = Vec::new();
        let mut failures: Vec<(String, ExportCause)> = Vec::new();

        for target in self.registry.targets() {
            self.check_cancelled()?;

            let dest = workspace.dump_path(&target.alias);
            info!(alias = %target.alias, "exporting");
            let started = Instant::now();

            match self.exporter.export(target, &dest) {
                Ok(()) => {
                    let size_bytes = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
                    info!(
                        alias = %target.alias,
                        size_bytes,
                        elapsed = ?started.elapsed(),
                        "export finished"
                    );
                    exported.push(ExportRecord {
                        alias: target.alias.clone(),
                        dump_path: dest,
                        size_bytes,
                        elapsed: started.elapsed(),
                    });
                }
                Err(cause) if self.settings.allow_partial => {
                    warn!(alias = %target.alias, "export failed, continuing: {}", cause);
                    failures.push((target.alias.clone(), cause));
                }
                Err(cause) => return Err(BackhaulError::export(target.alias.clone(), cause)),
            }
        }

        // A partial-backup run where nothing succeeded is still a failure,
        // reported as the first target's error.
        if exported.is_empty() {
            if let Some((alias, cause)) = failures.into_iter().next() {
                return Err(BackhaulError::Export { alias, cause });
            }
            return Ok((exported, Vec::new()));
        }

        let skipped: Vec<String> = failures.iter().map(|(alias, _)| alias.clone()).collect();
        for (alias, cause) in &failures {
            self.notifier.notify(
                Severity::Warning,
                &format!("Export of '{}' failed; continuing without it: {}", alias, cause),
            );
        }

        Ok((exported, skipped))
    }

    fn check_cancelled(&self) -> BackhaulResult<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(BackhaulError::Interrupted)
        } else {
            Ok(())
        }
    }
}

fn success_message(report: &RunReport) -> String {
    match &report.archive {
        Some(outcome) => {
            let mut msg = format!(
                "Backup run {} succeeded: {} dump(s) archived to {}",
                report.run_id,
                report.exported.len(),
                outcome.path.display()
            );
            if !report.skipped.is_empty() {
                msg.push_str(&format!(", {} target(s) skipped", report.skipped.len()));
            }
            if report.pruned > 0 {
                msg.push_str(&format!(", {} expired archive(s) pruned", report.pruned));
            }
            msg
        }
        None => format!(
            "Backup run {} finished: no targets configured",
            report.run_id
        ),
    }
}
