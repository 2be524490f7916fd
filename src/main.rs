use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use backhaul::config::{BackhaulPaths, Settings};
use backhaul::export::MysqlExporter;
use backhaul::notify::{Notifier, StderrNotifier, WebhookNotifier};
use backhaul::pipeline::BackupPipeline;
use backhaul::prune;

#[derive(Parser)]
#[command(
    name = "backhaul",
    version,
    about = "Scheduled backup orchestrator for MySQL database fleets",
    long_about = "Backhaul exports every configured database to a dump file, bundles \
                  the dumps into a single timestamped archive with owner-only \
                  permissions, prunes archives past the retention window, and \
                  reports the outcome to a webhook. Scheduling is left to cron \
                  or a systemd timer."
)]
struct Cli {
    /// Path to the settings file (defaults to the platform config location)
    #[arg(short, long, global = true, env = "BACKHAUL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full backup over every configured target
    Run,

    /// Delete archives older than the retention window
    Prune,

    /// Target management commands
    #[command(subcommand)]
    Targets(TargetCommands),

    /// Write a default settings file
    Init,

    /// Show the resolved configuration
    Config,
}

#[derive(Subcommand)]
enum TargetCommands {
    /// List configured backup targets
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => BackhaulPaths::new()?.settings_file(),
    };

    match cli.command {
        Commands::Run => run_backup(&settings_path),
        Commands::Prune => run_prune(&settings_path),
        Commands::Targets(TargetCommands::List) => list_targets(&settings_path),
        Commands::Init => init_settings(&settings_path),
        Commands::Config => show_config(&settings_path),
    }
}

fn run_backup(settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    settings.validate()?;
    let registry = settings.build_registry()?;

    let exporter = MysqlExporter::from_settings(&settings);
    let notifier: Box<dyn Notifier> = match WebhookNotifier::new(&settings.notify) {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            tracing::warn!("falling back to stderr notifications: {}", e);
            Box::new(StderrNotifier::new())
        }
    };

    // A first interrupt requests graceful shutdown; the pipeline notices at
    // the next stage boundary and unwinds through the normal cleanup path.
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })?;

    let pipeline =
        BackupPipeline::new(&settings, &registry, exporter, notifier).with_cancel_flag(cancel);
    let report = pipeline.run()?;

    match &report.archive {
        Some(outcome) => {
            println!("Backup run {} complete.", report.run_id);
            println!(
                "Archive: {} ({})",
                outcome.path.display(),
                format_size(outcome.size_bytes)
            );
            if !report.skipped.is_empty() {
                println!("Skipped: {}", report.skipped.join(", "));
            }
            if report.pruned > 0 {
                println!("Pruned {} expired archive(s).", report.pruned);
            }
        }
        None => println!("No targets configured; nothing to do."),
    }

    Ok(())
}

fn run_prune(settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;

    let deleted = prune::prune(&settings.backup_dir, settings.retention_age())?;
    println!(
        "Deleted {} archive(s) older than {} day(s).",
        deleted, settings.retention_days
    );

    Ok(())
}

fn list_targets(settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let registry = settings.build_registry()?;

    if registry.is_empty() {
        println!("No targets configured.");
        println!("Add targets to: {}", settings_path.display());
        return Ok(());
    }

    println!("Configured Targets");
    println!("==================");
    for (i, target) in registry.targets().iter().enumerate() {
        println!(
            "  {}. {} ({}@{}:{}/{})",
            i + 1,
            target.alias,
            target.user,
            target.host_or(&settings.default_host),
            target.port,
            target.database,
        );
    }
    println!();
    println!("Total: {} target(s)", registry.len());

    Ok(())
}

fn init_settings(settings_path: &Path) -> Result<()> {
    if settings_path.exists() {
        println!("Settings file already exists: {}", settings_path.display());
        return Ok(());
    }

    Settings::default().save(settings_path)?;

    println!("Created {}", settings_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add your database targets under \"targets\"");
    println!("  2. Set \"notify.webhook_url\" to your alerting channel");
    println!("  3. Schedule 'backhaul run' from cron or a systemd timer");

    Ok(())
}

fn show_config(settings_path: &Path) -> Result<()> {
    let settings = Settings::load_or_default(settings_path)?;

    let webhook = if settings.notify.webhook_url.is_empty() {
        "(not set)"
    } else {
        settings.notify.webhook_url.as_str()
    };

    println!("Backhaul Configuration");
    println!("======================");
    println!("Settings file:  {}", settings_path.display());
    println!("Backup dir:     {}", settings.backup_dir.display());
    println!("Retention:      {} day(s)", settings.retention_days);
    println!("Dump tool:      {}", settings.dump_tool);
    println!("Export timeout: {}s", settings.export_timeout_secs);
    println!(
        "Partial runs:   {}",
        if settings.allow_partial {
            "allowed"
        } else {
            "fail-fast"
        }
    );
    println!("Webhook:        {}", webhook);
    println!("Targets:        {}", settings.targets.len());

    if !settings_path.exists() {
        println!();
        println!("Settings file not found; showing defaults. Run 'backhaul init' to create it.");
    }

    Ok(())
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
