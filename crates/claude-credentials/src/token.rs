//! OAuth token record as written by the Claude CLI
//!
//! The on-disk document (and the macOS keychain secret) is a JSON object with
//! the token under `claudeAiOauth`. `expiresAt` is an absolute unix timestamp
//! in milliseconds, not a delta.

use common::Secret;
use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::{Error, Result};

/// A Claude CLI OAuth token.
///
/// Token strings are wrapped in `Secret` so `Debug` never prints them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    #[serde(default)]
    pub access_token: Secret<String>,
    #[serde(default)]
    pub refresh_token: Secret<String>,
    /// Expiration as unix timestamp in milliseconds
    pub expires_at: i64,
    /// Granted scopes, in the order they were stored
    #[serde(default, deserialize_with = "null_as_empty")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub rate_limit_tier: Option<String>,
}

impl OAuthToken {
    /// Whether the token is expired at `now_ms`. Strictly greater-than: a
    /// token expiring exactly now is still valid.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    /// Diagnostic view of this token relative to `now_ms`.
    pub fn report(&self, now_ms: i64) -> TokenReport {
        let expires_in_ms = self.expires_at.saturating_sub(now_ms);
        TokenReport {
            expires_at: self.expires_at,
            now: now_ms,
            expires_in_ms,
            expires_in_mins: round_half_up(expires_in_ms as f64 / 60_000.0),
            subscription_type: self.subscription_type.clone(),
            rate_limit_tier: self.rate_limit_tier.clone(),
            scopes: self.scopes.join(", "),
            access_token_len: self.access_token.char_len(),
            refresh_token_len: self.refresh_token.char_len(),
        }
    }
}

/// The credential document. Absence of the token key means no credentials
/// are configured, which is not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialBundle {
    #[serde(rename = "claudeAiOauth", default)]
    pub claude_ai_oauth: Option<OAuthToken>,
}

impl CredentialBundle {
    /// Parse a credential document.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential JSON: {e}")))
    }

    pub fn token(&self) -> Option<&OAuthToken> {
        self.claude_ai_oauth.as_ref()
    }
}

/// Derived token fields emitted when debug tracing is on.
///
/// Carries token lengths only, never token values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenReport {
    pub expires_at: i64,
    pub now: i64,
    pub expires_in_ms: i64,
    /// `expires_in_ms` in minutes, rounded half up (-1.5 rounds to -1)
    pub expires_in_mins: i64,
    pub subscription_type: Option<String>,
    pub rate_limit_tier: Option<String>,
    /// Scopes joined with `", "`
    pub scopes: String,
    pub access_token_len: usize,
    pub refresh_token_len: usize,
}

/// Result of a single expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryCheck {
    pub now: i64,
    pub expires_at: i64,
    pub expired: bool,
}

/// Largest magnitude, in ms from the epoch, of a representable timestamp
/// (100,000,000 days).
const MAX_EPOCH_MS: i64 = 8_640_000_000_000_000;

/// Render epoch milliseconds as UTC ISO-8601 with millisecond precision,
/// e.g. `2024-12-29T19:20:00.123Z`.
///
/// Years outside 0..=9999 use the six-digit signed form
/// (`+010000-01-01T00:00:00.000Z`). Values beyond ±8.64e15 ms render as
/// `Invalid Date`.
pub fn iso8601(epoch_ms: i64) -> String {
    const INVALID: &str = "Invalid Date";
    if epoch_ms.unsigned_abs() > MAX_EPOCH_MS.unsigned_abs() {
        return INVALID.to_string();
    }

    let format =
        format_description!("[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    let Some((dt, rest)) =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(epoch_ms) * 1_000_000)
            .ok()
            .and_then(|dt| Some((dt, dt.format(format).ok()?)))
    else {
        return INVALID.to_string();
    };

    let year = dt.year();
    if (0..=9999).contains(&year) {
        format!("{year:04}-{rest}")
    } else {
        format!("{year:+07}-{rest}")
    }
}

fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
