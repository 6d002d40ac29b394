//! Result of a token check and how it is presented
//!
//! Exit status: 0 valid, 1 expired, 2 no usable credentials.

use claude_credentials::{CredentialReader, iso8601};
use serde::Serialize;

/// What the check found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Outcome {
    Valid {
        expires_at: i64,
        expires_in_mins: i64,
        subscription_type: Option<String>,
    },
    Expired {
        expires_at: i64,
        expires_in_mins: i64,
    },
    /// The store was read but holds no OAuth token
    NotConfigured,
    /// The store could not be read; the reader already reported why
    Unavailable,
}

impl Outcome {
    /// Retrieve credentials and check expiry, passing `debug` through to
    /// the reader.
    pub fn evaluate(reader: &CredentialReader, debug: bool) -> Self {
        let Some(bundle) = reader.retrieve_credentials(debug) else {
            return Self::Unavailable;
        };
        let Some(token) = bundle.token() else {
            return Self::NotConfigured;
        };

        // One clock sample for both the remaining time and the verdict.
        let now = reader.now_millis();
        let report = token.report(now);
        if reader.is_expired_at(token, now, debug) {
            Self::Expired {
                expires_at: token.expires_at,
                expires_in_mins: report.expires_in_mins,
            }
        } else {
            Self::Valid {
                expires_at: token.expires_at,
                expires_in_mins: report.expires_in_mins,
                subscription_type: token.subscription_type.clone(),
            }
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Valid { .. } => 0,
            Self::Expired { .. } => 1,
            Self::NotConfigured | Self::Unavailable => 2,
        }
    }

    /// One-line human-readable summary.
    pub fn render_text(&self) -> String {
        match self {
            Self::Valid {
                expires_at,
                expires_in_mins,
                subscription_type,
            } => {
                let tier = subscription_type
                    .as_deref()
                    .map(|t| format!(" [{t}]"))
                    .unwrap_or_default();
                format!(
                    "valid: expires in {expires_in_mins} minutes at {}{tier}",
                    iso8601(*expires_at)
                )
            }
            Self::Expired { expires_at, .. } => {
                format!("expired: token expired at {}", iso8601(*expires_at))
            }
            Self::NotConfigured => "no Claude OAuth credentials configured".to_string(),
            Self::Unavailable => "credentials unavailable".to_string(),
        }
    }
}
