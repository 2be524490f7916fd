//! Operator notifications
//!
//! Wraps the external notification channel behind a narrow trait. Delivery is
//! best-effort: a bounded number of attempts with backoff, and any failure is
//! logged locally without ever changing the outcome of the backup run itself.

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::NotifySettings;
use crate::error::{BackhaulError, BackhaulResult};

/// How urgent a notification is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Uppercase label used on the wire
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivers messages to the operator
pub trait Notifier {
    /// Best-effort delivery; failures are logged, never propagated
    fn notify(&self, severity: Severity, message: &str);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, severity: Severity, message: &str) {
        (**self).notify(severity, message)
    }
}

/// Render the channel line: `<host> - <SEVERITY>: <message>`
fn format_line(host: &str, severity: Severity, message: &str) -> String {
    format!("{} - {}: {}", host, severity, message)
}

/// This machine's hostname, for the notification origin field
pub fn resolve_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string())
}

/// Posts notifications to a configured webhook
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    origin_host: String,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookNotifier {
    /// Create a notifier from the configured channel settings
    pub fn new(settings: &NotifySettings) -> BackhaulResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| BackhaulError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            webhook_url: settings.webhook_url.clone(),
            origin_host: resolve_hostname(),
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_secs(settings.backoff_secs),
        })
    }

    fn deliver(&self, line: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.webhook_url)
            .json(&json!({ "text": line }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let line = format_line(&self.origin_host, severity, message);

        for attempt in 1..=self.max_attempts {
            match self.deliver(&line) {
                Ok(()) => {
                    debug!(attempt, "notification delivered");
                    return;
                }
                Err(e) => warn!(attempt, "notification delivery failed: {}", e),
            }
            if attempt < self.max_attempts {
                thread::sleep(self.backoff * attempt);
            }
        }

        warn!(
            "giving up on notification after {} attempt(s): {}",
            self.max_attempts, line
        );
    }
}

/// Degraded channel that writes to stderr
///
/// Used when the webhook client cannot be constructed, so failures are still
/// visible to whatever captures the process output.
pub struct StderrNotifier {
    origin_host: String,
}

impl StderrNotifier {
    /// Create a stderr notifier
    pub fn new() -> Self {
        Self {
            origin_host: resolve_hostname(),
        }
    }
}

impl Default for StderrNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for StderrNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        eprintln!("{}", format_line(&self.origin_host, severity, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Info.label(), "INFO");
        assert_eq!(Severity::Warning.label(), "WARNING");
        assert_eq!(Severity::Error.label(), "ERROR");
    }

    #[test]
    fn test_message_shape() {
        let line = format_line("db-host-01", Severity::Error, "Export of 'app' failed");
        assert_eq!(line, "db-host-01 - ERROR: Export of 'app' failed");
    }

    #[test]
    fn test_delivery_failure_does_not_panic_or_propagate() {
        let settings = NotifySettings {
            // Nothing listens here; delivery must fail quietly
            webhook_url: "http://127.0.0.1:1/hook".to_string(),
            max_attempts: 1,
            backoff_secs: 0,
        };
        let notifier = WebhookNotifier::new(&settings).unwrap();
        notifier.notify(Severity::Error, "unreachable channel");
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let settings = NotifySettings {
            webhook_url: "http://127.0.0.1:1/hook".to_string(),
            max_attempts: 0,
            backoff_secs: 0,
        };
        let notifier = WebhookNotifier::new(&settings).unwrap();
        assert_eq!(notifier.max_attempts, 1);
    }
}
