//! Diagnostic output for credential retrieval
//!
//! The reader reports what it is doing through a single `Diagnostics` sink
//! instead of printing. `ConsoleDiagnostics` writes the human-readable
//! `[DEBUG]` lines to stdout and failures to stderr; `TracingDiagnostics`
//! emits the same events as structured `tracing` records.

use std::io::Write;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::Error;
use crate::source::SourceKind;
use crate::token::{ExpiryCheck, TokenReport, iso8601};

/// Receives reader events. Debug events are only delivered when the caller
/// asked for debug tracing; failures are always delivered, once per call.
pub trait Diagnostics: Send + Sync {
    fn fetching(&self, source: &SourceKind);
    fn token_loaded(&self, source: &SourceKind, report: &TokenReport);
    fn expiry_checked(&self, check: &ExpiryCheck);
    fn failure(&self, source: &SourceKind, error: &Error);
}

/// One-line, user-facing description of a failed retrieval.
pub fn failure_message(source: &SourceKind, error: &Error) -> String {
    match (source, error) {
        (SourceKind::Unsupported(_), _) | (_, Error::UnsupportedPlatform(_)) => {
            "OAuth token extraction is only supported on macOS, Windows and Linux.".to_string()
        }
        (SourceKind::Keychain { .. }, Error::NotFound(_)) => {
            "No Claude Code credentials found in keychain".to_string()
        }
        (SourceKind::Keychain { .. }, _) => {
            format!("Failed to retrieve credentials from keychain: {error}")
        }
        (SourceKind::File(_), _) => format!("Failed to retrieve credentials: {error}"),
    }
}

type Sink = Mutex<Box<dyn Write + Send>>;

/// Plain-text diagnostics on stdout/stderr.
pub struct ConsoleDiagnostics {
    out: Sink,
    err: Sink,
}

impl ConsoleDiagnostics {
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    /// Write to the process's stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    fn write_out(&self, text: &str) {
        write_to(&self.out, text);
    }
}

// Output is advisory; a closed pipe must not turn into a failed retrieval.
fn write_to(sink: &Sink, text: &str) {
    if let Ok(mut w) = sink.lock() {
        let _ = w.write_all(text.as_bytes());
        let _ = w.flush();
    }
}

impl Diagnostics for ConsoleDiagnostics {
    fn fetching(&self, source: &SourceKind) {
        match source {
            SourceKind::File(path) => {
                self.write_out(&format!(
                    "[DEBUG] Fetching credentials from {}\n",
                    path.display()
                ));
            }
            SourceKind::Keychain { account, .. } => {
                self.write_out(&format!("[DEBUG] Reading keychain for user: {account}\n"));
            }
            SourceKind::Unsupported(_) => {}
        }
    }

    fn token_loaded(&self, source: &SourceKind, report: &TokenReport) {
        self.write_out(&render_report(source, report));
    }

    fn expiry_checked(&self, check: &ExpiryCheck) {
        self.write_out(&format!(
            "[DEBUG] Token expiry check:\n  \
             - now:       {} ({})\n  \
             - expiresAt: {} ({})\n  \
             - expired:   {}\n",
            check.now,
            iso8601(check.now),
            check.expires_at,
            iso8601(check.expires_at),
            check.expired,
        ));
    }

    fn failure(&self, source: &SourceKind, error: &Error) {
        write_to(&self.err, &format!("{}\n", failure_message(source, error)));
    }
}

fn render_report(source: &SourceKind, report: &TokenReport) -> String {
    format!(
        "[DEBUG] Token retrieved from {source}:\n  \
         - expiresAt: {} ({})\n  \
         - now:       {} ({})\n  \
         - expires in: {} minutes ({}ms)\n  \
         - subscriptionType: {}\n  \
         - rateLimitTier: {}\n  \
         - scopes: {}\n  \
         - accessToken length: {}\n  \
         - refreshToken length: {}\n",
        report.expires_at,
        iso8601(report.expires_at),
        report.now,
        iso8601(report.now),
        report.expires_in_mins,
        report.expires_in_ms,
        report.subscription_type.as_deref().unwrap_or("undefined"),
        report.rate_limit_tier.as_deref().unwrap_or("undefined"),
        report.scopes,
        report.access_token_len,
        report.refresh_token_len,
    )
}

/// Emits reader events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn fetching(&self, source: &SourceKind) {
        debug!(source = %source, "fetching credentials");
    }

    fn token_loaded(&self, source: &SourceKind, report: &TokenReport) {
        debug!(
            source = %source,
            expires_at = report.expires_at,
            expires_at_iso = %iso8601(report.expires_at),
            now = report.now,
            expires_in_ms = report.expires_in_ms,
            expires_in_mins = report.expires_in_mins,
            subscription_type = report.subscription_type.as_deref().unwrap_or("undefined"),
            rate_limit_tier = report.rate_limit_tier.as_deref().unwrap_or("undefined"),
            scopes = %report.scopes,
            access_token_len = report.access_token_len,
            refresh_token_len = report.refresh_token_len,
            "token retrieved"
        );
    }

    fn expiry_checked(&self, check: &ExpiryCheck) {
        debug!(
            now = check.now,
            expires_at = check.expires_at,
            expired = check.expired,
            "token expiry check"
        );
    }

    fn failure(&self, source: &SourceKind, error: &Error) {
        warn!(source = %source, error = %error, "{}", failure_message(source, error));
    }
}
