//! Child-process exporter for mysqldump-compatible tools
//!
//! Invokes the configured dump tool once per target with a consistent
//! snapshot read (`--single-transaction`, no table locks) and with stored
//! routines, triggers, and scheduled events included, since a restore that
//! silently loses those is a correctness defect. The dump is written to a
//! staging name and renamed into place only on success, so a failed export
//! never leaves a partial file behind.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Settings;
use crate::error::ExportCause;
use crate::targets::Target;

use super::Exporter;

/// How often a running dump tool is checked for completion
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How much of the tool's stderr is kept for diagnostics
const STDERR_TAIL: usize = 500;

/// Exports a target by driving the dump tool as a child process
pub struct MysqlExporter {
    tool: String,
    default_host: String,
    timeout: Duration,
}

impl MysqlExporter {
    /// Create a new exporter
    pub fn new(
        tool: impl Into<String>,
        default_host: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            tool: tool.into(),
            default_host: default_host.into(),
            timeout,
        }
    }

    /// Create an exporter from the loaded settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.dump_tool.clone(),
            settings.default_host.clone(),
            settings.export_timeout(),
        )
    }

    fn run_tool(&self, target: &Target, staged: &Path) -> Result<(), ExportCause> {
        let out = File::create(staged)?;

        // The credential travels via the environment, never argv, so it does
        // not show up in the process table.
        let mut child = Command::new(&self.tool)
            .arg("--single-transaction")
            .arg("--routines")
            .arg("--triggers")
            .arg("--events")
            .arg("--host")
            .arg(target.host_or(&self.default_host))
            .arg("--port")
            .arg(target.port.to_string())
            .arg("--user")
            .arg(&target.user)
            .arg(&target.database)
            .env("MYSQL_PWD", target.credential.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::piped())
            .spawn()?;

        let status = match wait_with_timeout(&mut child, self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExportCause::Timeout(self.timeout));
            }
        };

        if !status.success() {
            return Err(ExportCause::ToolFailure {
                status: status.to_string(),
                stderr: read_stderr_tail(&mut child),
            });
        }

        Ok(())
    }
}

impl Exporter for MysqlExporter {
    fn export(&self, target: &Target, dest: &Path) -> Result<(), ExportCause> {
        let staged = staged_path(dest);
        debug!(alias = %target.alias, tool = %self.tool, "starting export");

        match self.run_tool(target, &staged) {
            Ok(()) => fs::rename(&staged, dest).map_err(|e| {
                discard(&staged);
                ExportCause::Io(e)
            }),
            Err(cause) => {
                discard(&staged);
                Err(cause)
            }
        }
    }
}

/// `<dest>.part`, renamed to `dest` only once the tool has succeeded
fn staged_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn discard(path: &Path) {
    let _ = fs::remove_file(path);
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Last part of the tool's stderr; mysqldump prints the useful line last
fn read_stderr_tail(child: &mut Child) -> String {
    let mut buf = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut buf);
    }

    let trimmed = buf.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed.to_string();
    }

    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    use crate::targets::Credential;

    fn write_stub(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("fake-mysqldump");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn sample_target() -> Target {
        Target {
            alias: "app".to_string(),
            host: None,
            port: 3306,
            user: "backup".to_string(),
            credential: Credential::new("secret"),
            database: "app_db".to_string(),
        }
    }

    #[test]
    fn test_export_success_writes_dump() {
        let tmp = TempDir::new().unwrap();
        let tool = write_stub(tmp.path(), r#"echo "-- dump data""#);
        let dest = tmp.path().join("app.sql");

        let exporter = MysqlExporter::new(
            tool.to_string_lossy(),
            "127.0.0.1",
            Duration::from_secs(10),
        );
        exporter.export(&sample_target(), &dest).unwrap();

        let contents = fs::read_to_string(&dest).unwrap();
        assert!(contents.contains("-- dump data"));
        assert!(!staged_path(&dest).exists());
    }

    #[test]
    fn test_export_failure_removes_partial_file() {
        let tmp = TempDir::new().unwrap();
        let tool = write_stub(
            tmp.path(),
            "echo \"partial output\"\necho \"Access denied\" >&2\nexit 3",
        );
        let dest = tmp.path().join("app.sql");

        let exporter = MysqlExporter::new(
            tool.to_string_lossy(),
            "127.0.0.1",
            Duration::from_secs(10),
        );
        let err = exporter.export(&sample_target(), &dest).unwrap_err();

        match err {
            ExportCause::ToolFailure { stderr, .. } => assert!(stderr.contains("Access denied")),
            other => panic!("expected ToolFailure, got {:?}", other),
        }
        assert!(!dest.exists());
        assert!(!staged_path(&dest).exists());
    }

    #[test]
    fn test_export_timeout_kills_tool() {
        let tmp = TempDir::new().unwrap();
        let tool = write_stub(tmp.path(), "sleep 30");
        let dest = tmp.path().join("app.sql");

        let exporter = MysqlExporter::new(
            tool.to_string_lossy(),
            "127.0.0.1",
            Duration::from_millis(500),
        );
        let err = exporter.export(&sample_target(), &dest).unwrap_err();

        assert!(matches!(err, ExportCause::Timeout(_)));
        assert!(!dest.exists());
        assert!(!staged_path(&dest).exists());
    }

    #[test]
    fn test_export_missing_tool_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("app.sql");

        let exporter = MysqlExporter::new(
            "/nonexistent/fake-mysqldump",
            "127.0.0.1",
            Duration::from_secs(10),
        );
        let err = exporter.export(&sample_target(), &dest).unwrap_err();

        assert!(matches!(err, ExportCause::Io(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_passes_consistency_flags_and_credential() {
        let tmp = TempDir::new().unwrap();
        let args_file = tmp.path().join("args.txt");
        let pwd_file = tmp.path().join("pwd.txt");
        let tool = write_stub(
            tmp.path(),
            &format!(
                "printf '%s\\n' \"$@\" > \"{}\"\nprintf '%s' \"$MYSQL_PWD\" > \"{}\"\nexit 0",
                args_file.display(),
                pwd_file.display()
            ),
        );
        let dest = tmp.path().join("app.sql");

        let exporter =
            MysqlExporter::new(tool.to_string_lossy(), "10.1.2.3", Duration::from_secs(10));
        exporter.export(&sample_target(), &dest).unwrap();

        let args = fs::read_to_string(&args_file).unwrap();
        assert!(args.contains("--single-transaction"));
        assert!(args.contains("--routines"));
        assert!(args.contains("--triggers"));
        assert!(args.contains("--events"));
        assert!(args.contains("10.1.2.3"));
        assert!(args.contains("3306"));
        assert!(args.contains("app_db"));
        assert!(!args.contains("secret"));

        assert_eq!(fs::read_to_string(&pwd_file).unwrap(), "secret");
    }
}
