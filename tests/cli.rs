//! End-to-end tests of the backhaul binary
//!
//! These drive the compiled CLI against a throwaway config directory and a
//! stub dump tool, checking the exit-code contract and the on-disk results.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A webhook nothing listens on; delivery fails fast and stays non-fatal
const DEAD_WEBHOOK: &str = "http://127.0.0.1:9/hook";

fn backhaul() -> Command {
    Command::cargo_bin("backhaul").unwrap()
}

fn write_settings(
    dir: &Path,
    backup_dir: &Path,
    dump_tool: &str,
    targets: &str,
    webhook: &str,
) -> PathBuf {
    let path = dir.join("config.json");
    let json = format!(
        r#"{{
    "backup_dir": "{backup}",
    "retention_days": 7,
    "dump_tool": "{tool}",
    "export_timeout_secs": 30,
    "notify": {{ "webhook_url": "{webhook}", "max_attempts": 1, "backoff_secs": 0 }},
    "targets": [{targets}]
}}"#,
        backup = backup_dir.display(),
        tool = dump_tool,
        webhook = webhook,
        targets = targets,
    );
    fs::write(&path, json).unwrap();
    path
}

fn target_json(alias: &str) -> String {
    format!(
        r#"{{ "alias": "{alias}", "user": "backup", "credential": "pw", "database": "{alias}_db" }}"#
    )
}

#[cfg(unix)]
fn write_stub_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-mysqldump");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn archive_names(backup_dir: &Path) -> Vec<String> {
    if !backup_dir.exists() {
        return Vec::new();
    }
    fs::read_dir(backup_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with("-backup.tar.gz"))
        .collect()
}

fn no_workspace_left(backup_dir: &Path) -> bool {
    if !backup_dir.exists() {
        return true;
    }
    fs::read_dir(backup_dir).unwrap().all(|e| {
        !e.unwrap()
            .file_name()
            .to_string_lossy()
            .starts_with("backup_temp_")
    })
}

#[test]
fn test_empty_target_list_is_noop_success() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    let cfg = write_settings(tmp.path(), &backup_dir, "mysqldump", "", DEAD_WEBHOOK);

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("No targets configured"));

    assert!(archive_names(&backup_dir).is_empty());
    assert!(no_workspace_left(&backup_dir));
}

#[test]
fn test_missing_webhook_is_fatal_at_startup() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    let cfg = write_settings(tmp.path(), &backup_dir, "mysqldump", "", "");

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("webhook_url"));
}

#[test]
fn test_missing_settings_file_is_fatal() {
    let tmp = TempDir::new().unwrap();

    backhaul()
        .arg("--config")
        .arg(tmp.path().join("absent.json"))
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings file not found"));
}

#[cfg(unix)]
#[test]
fn test_run_creates_archive_and_cleans_workspace() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    let tool = write_stub_tool(tmp.path(), r#"echo "-- dump""#);
    let targets = format!("{}, {}", target_json("a"), target_json("b"));
    let cfg = write_settings(
        tmp.path(),
        &backup_dir,
        &tool.to_string_lossy(),
        &targets,
        DEAD_WEBHOOK,
    );

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup run"));

    assert_eq!(archive_names(&backup_dir).len(), 1);
    assert!(no_workspace_left(&backup_dir));
}

#[cfg(unix)]
#[test]
fn test_failing_export_aborts_without_archive() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    let tool = write_stub_tool(tmp.path(), "echo \"Access denied\" >&2\nexit 3");
    let cfg = write_settings(
        tmp.path(),
        &backup_dir,
        &tool.to_string_lossy(),
        &target_json("orders"),
        DEAD_WEBHOOK,
    );

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("orders"));

    assert!(archive_names(&backup_dir).is_empty());
    assert!(no_workspace_left(&backup_dir));
}

#[test]
fn test_prune_command_deletes_expired_archives() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    fs::create_dir_all(&backup_dir).unwrap();

    let stale = backup_dir.join("2026-01-01_00-00-00-backup.tar.gz");
    fs::write(&stale, "old").unwrap();
    let mtime = std::time::SystemTime::now() - std::time::Duration::from_secs(40 * 86_400);
    fs::File::options()
        .write(true)
        .open(&stale)
        .unwrap()
        .set_modified(mtime)
        .unwrap();

    let fresh = backup_dir.join("2026-08-05_00-00-00-backup.tar.gz");
    fs::write(&fresh, "new").unwrap();

    let cfg = write_settings(tmp.path(), &backup_dir, "mysqldump", "", DEAD_WEBHOOK);

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 archive(s)"));

    assert!(!stale.exists());
    assert!(fresh.exists());
}

#[test]
fn test_targets_list_shows_fleet() {
    let tmp = TempDir::new().unwrap();
    let backup_dir = tmp.path().join("archives");
    let targets = format!("{}, {}", target_json("orders"), target_json("billing"));
    let cfg = write_settings(tmp.path(), &backup_dir, "mysqldump", &targets, DEAD_WEBHOOK);

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("targets")
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("orders")
                .and(predicate::str::contains("billing"))
                .and(predicate::str::contains("Total: 2 target(s)")),
        );
}

#[test]
fn test_init_writes_default_settings() {
    let tmp = TempDir::new().unwrap();
    let cfg = tmp.path().join("config.json");

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    assert!(cfg.exists());

    backhaul()
        .arg("--config")
        .arg(&cfg)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backhaul Configuration"));
}
