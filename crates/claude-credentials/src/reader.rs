//! Credential reader
//!
//! Selects a `CredentialSource` for the platform once, then answers two
//! questions: what credentials are stored, and has a given token expired.
//! Every call is a single synchronous attempt with no retained state.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::constants::{CREDENTIALS_DIR, CREDENTIALS_FILE, KEYCHAIN_SERVICE, SECURITY_PROGRAM};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::platform::{Environment, Platform};
use crate::source::{
    CredentialSource, FileSource, KeychainSource, SecurityCli, SourceKind, UnresolvedSource,
    UnsupportedSource,
};
use crate::token::{CredentialBundle, ExpiryCheck, OAuthToken};

/// Explicit reader inputs. Anything left unset falls back to platform
/// detection and the process `Environment`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub home_dir: Option<PathBuf>,
    #[serde(default)]
    pub username: Option<String>,
    /// Read this file instead of `<home>/.claude/.credentials.json`.
    /// Ignored on macOS, which reads the keychain.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    #[serde(default = "default_security_program")]
    pub security_program: PathBuf,
}

fn default_keychain_service() -> String {
    KEYCHAIN_SERVICE.to_string()
}

fn default_security_program() -> PathBuf {
    PathBuf::from(SECURITY_PROGRAM)
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            platform: None,
            home_dir: None,
            username: None,
            credentials_path: None,
            keychain_service: default_keychain_service(),
            security_program: default_security_program(),
        }
    }
}

impl ReaderConfig {
    /// The configured platform, or the build target's.
    pub fn resolved_platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }
}

/// Reads Claude CLI OAuth credentials and checks token expiry.
pub struct CredentialReader {
    platform: Platform,
    source: Box<dyn CredentialSource>,
    clock: Box<dyn Clock>,
    diagnostics: Box<dyn Diagnostics>,
}

impl CredentialReader {
    pub fn new(
        platform: Platform,
        source: Box<dyn CredentialSource>,
        diagnostics: Box<dyn Diagnostics>,
    ) -> Self {
        Self {
            platform,
            source,
            clock: Box::new(SystemClock),
            diagnostics,
        }
    }

    /// Build a reader for the configured platform.
    ///
    /// Never fails. A missing home directory (Windows/Linux, unless
    /// `credentials_path` is set) or username (macOS) yields a source whose
    /// every load fails with `Error::MissingEnvironment`, reported like any
    /// other unreachable store. Unsupported platforms get a reader whose
    /// retrievals report and return `None` without touching any storage.
    pub fn from_config(
        config: &ReaderConfig,
        env: &Environment,
        diagnostics: Box<dyn Diagnostics>,
    ) -> Self {
        let platform = config.resolved_platform();

        let source: Box<dyn CredentialSource> = match &platform {
            Platform::Windows | Platform::Linux => {
                match (&config.credentials_path, &config.home_dir, &env.home_dir) {
                    (Some(path), _, _) => Box::new(FileSource::new(path.clone())),
                    (None, Some(home), _) | (None, None, Some(home)) => Box::new(FileSource::new(
                        home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE),
                    )),
                    (None, None, None) => {
                        let var = platform.home_var();
                        Box::new(UnresolvedSource::new(
                            SourceKind::File(
                                PathBuf::from(format!("${var}"))
                                    .join(CREDENTIALS_DIR)
                                    .join(CREDENTIALS_FILE),
                            ),
                            format!("{var} is not set and no home_dir is configured"),
                        ))
                    }
                }
            }
            Platform::MacOs => match config.username.clone().or_else(|| env.username.clone()) {
                Some(username) => Box::new(KeychainSource::new(
                    config.keychain_service.clone(),
                    username,
                    Box::new(SecurityCli::new(config.security_program.clone())),
                )),
                None => Box::new(UnresolvedSource::new(
                    SourceKind::Keychain {
                        service: config.keychain_service.clone(),
                        account: String::new(),
                    },
                    "could not determine the current username",
                )),
            },
            Platform::Unsupported(os) => Box::new(UnsupportedSource::new(os.clone())),
        };

        debug!(platform = %platform, source = %source.kind(), "credential reader configured");
        Self::new(platform, source, diagnostics)
    }

    /// Replace the wall clock used for expiry checks and debug reports.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Load the credential document, returning the typed error on failure.
    /// Emits no diagnostics.
    pub fn load(&self) -> Result<CredentialBundle> {
        self.source.load()
    }

    /// Load the credential document.
    ///
    /// Returns `None` on any failure (unreadable store, malformed JSON,
    /// keychain miss or error, unsupported platform) after reporting it once
    /// through the diagnostics sink. A bundle without a token is a success.
    pub fn retrieve_credentials(&self, debug: bool) -> Option<CredentialBundle> {
        let source = self.source.kind();
        if debug && !matches!(source, SourceKind::Unsupported(_)) {
            self.diagnostics.fetching(&source);
        }

        match self.source.load() {
            Ok(bundle) => {
                if debug && let Some(token) = bundle.token() {
                    let report = token.report(self.clock.now_millis());
                    self.diagnostics.token_loaded(&source, &report);
                }
                Some(bundle)
            }
            Err(e) => {
                self.diagnostics.failure(&source, &e);
                None
            }
        }
    }

    /// Current time in unix milliseconds, from the reader's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Whether `token` has expired, sampling the clock once. Strictly
    /// greater-than, no skew margin.
    pub fn is_expired(&self, token: &OAuthToken, debug: bool) -> bool {
        self.is_expired_at(token, self.clock.now_millis(), debug)
    }

    /// Whether `token` has expired at `now_ms`, for callers that need other
    /// values derived from the same instant.
    pub fn is_expired_at(&self, token: &OAuthToken, now_ms: i64, debug: bool) -> bool {
        let expired = token.is_expired_at(now_ms);
        if debug {
            self.diagnostics.expiry_checked(&ExpiryCheck {
                now: now_ms,
                expires_at: token.expires_at,
                expired,
            });
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::diagnostics::tests::{SharedBuf, console};
    use crate::error::Error;
    use crate::source::tests::FakeKeychain;

    const NOW: i64 = 1_735_500_000_000;

    fn credentials_json(expires_at: i64) -> String {
        format!(
            r#"{{"claudeAiOauth":{{"accessToken":"sk-ant-oat01-xyz","refreshToken":"sk-ant-ort01-abcdef","expiresAt":{expires_at},"scopes":["user:profile","user:inference"],"subscriptionType":"max","rateLimitTier":"default_claude_max_5x"}}}}"#
        )
    }

    /// Writes `<home>/.claude/.credentials.json` under a temp home.
    fn temp_home(contents: &str) -> tempfile::TempDir {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".claude");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".credentials.json"), contents).unwrap();
        home
    }

    fn linux_config(home: &std::path::Path) -> ReaderConfig {
        ReaderConfig {
            platform: Some(Platform::Linux),
            home_dir: Some(home.to_path_buf()),
            ..ReaderConfig::default()
        }
    }

    fn file_reader(config: &ReaderConfig) -> (CredentialReader, SharedBuf, SharedBuf) {
        let (diag, out, err) = console();
        let reader = CredentialReader::from_config(config, &Environment::default(), Box::new(diag))
            .with_clock(FixedClock(NOW));
        (reader, out, err)
    }

    fn keychain_reader(fake: FakeKeychain) -> (CredentialReader, SharedBuf, SharedBuf) {
        let (diag, out, err) = console();
        let source = KeychainSource::new(KEYCHAIN_SERVICE, "alice", Box::new(fake));
        let reader = CredentialReader::new(Platform::MacOs, Box::new(source), Box::new(diag))
            .with_clock(FixedClock(NOW));
        (reader, out, err)
    }

    #[test]
    fn linux_reads_home_credentials_file() {
        let home = temp_home(&credentials_json(NOW + 3_600_000));
        let (reader, out, err) = file_reader(&linux_config(home.path()));

        let bundle = reader.retrieve_credentials(false).unwrap();
        let token = bundle.token().unwrap();
        assert_eq!(token.access_token.expose(), "sk-ant-oat01-xyz");
        assert_eq!(token.refresh_token.expose(), "sk-ant-ort01-abcdef");
        assert_eq!(token.expires_at, NOW + 3_600_000);
        assert_eq!(token.scopes, vec!["user:profile", "user:inference"]);
        assert_eq!(token.subscription_type.as_deref(), Some("max"));
        assert_eq!(token.rate_limit_tier.as_deref(), Some("default_claude_max_5x"));
        assert!(out.contents().is_empty(), "no debug output without debug");
        assert!(err.contents().is_empty());
    }

    #[test]
    fn home_dir_falls_back_to_environment() {
        let home = temp_home(&credentials_json(NOW));
        let config = ReaderConfig {
            platform: Some(Platform::Windows),
            ..ReaderConfig::default()
        };
        let env = Environment {
            home_dir: Some(home.path().to_path_buf()),
            username: None,
        };
        let (diag, _out, _err) = console();
        let reader = CredentialReader::from_config(&config, &env, Box::new(diag));
        assert_eq!(
            reader.source_kind(),
            SourceKind::File(home.path().join(".claude").join(".credentials.json"))
        );
        assert!(reader.retrieve_credentials(false).is_some());
    }

    #[test]
    fn credentials_path_overrides_home() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, credentials_json(NOW)).unwrap();
        let config = ReaderConfig {
            platform: Some(Platform::Linux),
            credentials_path: Some(path.clone()),
            ..ReaderConfig::default()
        };
        let (reader, _out, _err) = file_reader(&config);
        assert_eq!(reader.source_kind(), SourceKind::File(path));
        assert!(reader.retrieve_credentials(false).is_some());
    }

    #[test]
    fn missing_file_returns_none_with_one_error_line() {
        let home = tempfile::tempdir().unwrap();
        let (reader, out, err) = file_reader(&linux_config(home.path()));

        assert!(reader.retrieve_credentials(false).is_none());
        let stderr = err.contents();
        assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
        assert!(
            stderr.starts_with("Failed to retrieve credentials: I/O error"),
            "{stderr}"
        );
        assert!(out.contents().is_empty());
    }

    #[test]
    fn malformed_file_returns_none() {
        let home = temp_home("this is not json");
        let (reader, _out, err) = file_reader(&linux_config(home.path()));

        assert!(reader.retrieve_credentials(true).is_none());
        assert!(err.contents().contains("credential parse error"));
    }

    #[test]
    fn empty_document_is_success_without_token() {
        let home = temp_home("{}");
        let (reader, out, err) = file_reader(&linux_config(home.path()));

        let bundle = reader.retrieve_credentials(true).unwrap();
        assert!(bundle.token().is_none());
        assert!(err.contents().is_empty());
        // Only the fetching line; no token report without a token
        assert_eq!(out.contents().lines().count(), 1);
    }

    #[test]
    fn debug_reports_rounded_minutes() {
        let home = temp_home(&credentials_json(NOW + 90_000));
        let (reader, out, _err) = file_reader(&linux_config(home.path()));

        reader.retrieve_credentials(true).unwrap();
        let text = out.contents();
        assert!(
            text.starts_with("[DEBUG] Fetching credentials from "),
            "{text}"
        );
        assert!(text.contains("  - expires in: 2 minutes (90000ms)\n"), "{text}");
        assert!(text.contains("  - accessToken length: 16\n"), "{text}");
        assert!(text.contains("  - refreshToken length: 19\n"), "{text}");
        assert!(!text.contains("sk-ant-oat01-xyz"), "token value leaked: {text}");
    }

    #[test]
    fn unsupported_platform_touches_nothing() {
        // A valid file exists, but an unsupported platform must not read it
        let home = temp_home(&credentials_json(NOW));
        let config = ReaderConfig {
            platform: Some(Platform::Unsupported("plan9".into())),
            home_dir: Some(home.path().to_path_buf()),
            ..ReaderConfig::default()
        };
        let (reader, out, err) = file_reader(&config);

        assert!(reader.retrieve_credentials(true).is_none());
        assert_eq!(
            err.contents(),
            "OAuth token extraction is only supported on macOS, Windows and Linux.\n"
        );
        assert!(out.contents().is_empty());
        assert!(matches!(
            reader.load().unwrap_err(),
            Error::UnsupportedPlatform(_)
        ));
    }

    #[test]
    fn keychain_success_returns_bundle() {
        let fake = FakeKeychain::returning(true, &credentials_json(NOW + 120_000), "");
        let calls = fake.calls.clone();
        let (reader, out, err) = keychain_reader(fake);

        let bundle = reader.retrieve_credentials(true).unwrap();
        assert_eq!(bundle.token().unwrap().expires_at, NOW + 120_000);
        assert_eq!(calls.lock().unwrap().len(), 1, "single attempt, no retries");

        let text = out.contents();
        assert!(
            text.starts_with("[DEBUG] Reading keychain for user: alice\n"),
            "{text}"
        );
        assert!(text.contains("[DEBUG] Token retrieved from keychain:\n"), "{text}");
        assert!(text.contains("  - expires in: 2 minutes (120000ms)\n"), "{text}");
        assert!(err.contents().is_empty());
    }

    #[test]
    fn keychain_not_found_uses_specific_message() {
        let fake = FakeKeychain::returning(
            false,
            "",
            "security: SecKeychainSearchCopyNext: \
             The specified item could not be found in the keychain.",
        );
        let (reader, _out, err) = keychain_reader(fake);

        assert!(reader.retrieve_credentials(false).is_none());
        assert_eq!(err.contents(), "No Claude Code credentials found in keychain\n");
    }

    #[test]
    fn keychain_other_failure_uses_generic_message() {
        let fake = FakeKeychain::returning(
            false,
            "",
            "security: The user name or passphrase you entered is not correct.",
        );
        let (reader, _out, err) = keychain_reader(fake);

        assert!(reader.retrieve_credentials(false).is_none());
        let stderr = err.contents();
        assert_eq!(stderr.lines().count(), 1);
        assert!(
            stderr.starts_with("Failed to retrieve credentials from keychain: "),
            "{stderr}"
        );
    }

    #[test]
    fn keychain_spawn_failure_uses_generic_message() {
        let (reader, _out, err) = keychain_reader(FakeKeychain::unspawnable());
        assert!(reader.retrieve_credentials(false).is_none());
        assert!(
            err.contents()
                .starts_with("Failed to retrieve credentials from keychain: ")
        );
    }

    #[test]
    fn macos_config_builds_keychain_source() {
        let config = ReaderConfig {
            platform: Some(Platform::MacOs),
            username: Some("bob".into()),
            ..ReaderConfig::default()
        };
        let (diag, _out, _err) = console();
        let reader =
            CredentialReader::from_config(&config, &Environment::default(), Box::new(diag));
        assert_eq!(reader.platform(), &Platform::MacOs);
        assert_eq!(
            reader.source_kind(),
            SourceKind::Keychain {
                service: "Claude Code-credentials".into(),
                account: "bob".into()
            }
        );
    }

    #[test]
    fn macos_without_username_reports_one_keychain_failure() {
        let config = ReaderConfig {
            platform: Some(Platform::MacOs),
            security_program: PathBuf::from("/nonexistent/bin/security"),
            ..ReaderConfig::default()
        };
        let (diag, out, err) = console();
        let reader =
            CredentialReader::from_config(&config, &Environment::default(), Box::new(diag));

        assert!(reader.retrieve_credentials(false).is_none());
        let stderr = err.contents();
        assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
        assert!(
            stderr.starts_with("Failed to retrieve credentials from keychain: missing environment"),
            "{stderr}"
        );
        assert!(out.contents().is_empty());
        assert!(matches!(
            reader.load().unwrap_err(),
            Error::MissingEnvironment(_)
        ));
    }

    #[test]
    fn linux_without_home_reports_one_file_failure() {
        let config = ReaderConfig {
            platform: Some(Platform::Linux),
            ..ReaderConfig::default()
        };
        let (diag, _out, err) = console();
        let reader =
            CredentialReader::from_config(&config, &Environment::default(), Box::new(diag));

        assert_eq!(
            reader.source_kind(),
            SourceKind::File(PathBuf::from("$HOME/.claude/.credentials.json"))
        );
        assert!(reader.retrieve_credentials(false).is_none());
        let stderr = err.contents();
        assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
        assert!(
            stderr.starts_with("Failed to retrieve credentials: missing environment"),
            "{stderr}"
        );
        assert!(stderr.contains("HOME is not set"), "{stderr}");
    }

    #[test]
    fn windows_without_home_names_userprofile() {
        let config = ReaderConfig {
            platform: Some(Platform::Windows),
            ..ReaderConfig::default()
        };
        let (diag, _out, err) = console();
        let reader =
            CredentialReader::from_config(&config, &Environment::default(), Box::new(diag));

        assert!(reader.retrieve_credentials(true).is_none());
        assert!(err.contents().contains("USERPROFILE is not set"));
    }

    #[test]
    fn keychain_multiline_failure_is_one_stderr_line() {
        let fake = FakeKeychain::returning(
            false,
            "",
            "security: SecKeychainCopyDefault failed\nKeychain is locked.\n",
        );
        let (reader, _out, err) = keychain_reader(fake);

        assert!(reader.retrieve_credentials(false).is_none());
        let stderr = err.contents();
        assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
        assert!(stderr.ends_with("failed Keychain is locked.\n"), "{stderr}");
    }

    #[test]
    fn is_expired_at_uses_given_instant() {
        let home = tempfile::tempdir().unwrap();
        let (reader, out, _err) = file_reader(&linux_config(home.path()));
        let token = CredentialBundle::from_json(&credentials_json(NOW))
            .unwrap()
            .claude_ai_oauth
            .unwrap();

        assert_eq!(reader.now_millis(), NOW);
        assert!(reader.is_expired_at(&token, NOW + 1, true));
        assert!(!reader.is_expired_at(&token, NOW, false));
        assert!(
            out.contents().contains(&format!("  - now:       {} (", NOW + 1)),
            "{}",
            out.contents()
        );
    }

    #[test]
    fn is_expired_compares_strictly() {
        let home = tempfile::tempdir().unwrap();
        let (reader, out, _err) = file_reader(&linux_config(home.path()));

        let token_at = |expires_at| {
            CredentialBundle::from_json(&credentials_json(expires_at))
                .unwrap()
                .claude_ai_oauth
                .unwrap()
        };
        assert!(reader.is_expired(&token_at(NOW - 1), false));
        assert!(!reader.is_expired(&token_at(NOW + 1), false));
        assert!(!reader.is_expired(&token_at(NOW), false));
        assert!(out.contents().is_empty());
    }

    #[test]
    fn is_expired_debug_emits_trio() {
        let home = tempfile::tempdir().unwrap();
        let (reader, out, _err) = file_reader(&linux_config(home.path()));
        let token = CredentialBundle::from_json(&credentials_json(NOW - 5))
            .unwrap()
            .claude_ai_oauth
            .unwrap();

        assert!(reader.is_expired(&token, true));
        let text = out.contents();
        assert!(text.starts_with("[DEBUG] Token expiry check:\n"), "{text}");
        assert!(text.contains(&format!("  - now:       {NOW} (")), "{text}");
        assert!(text.contains(&format!("  - expiresAt: {} (", NOW - 5)), "{text}");
        assert!(text.ends_with("  - expired:   true\n"), "{text}");
    }

    #[test]
    fn reader_config_deserializes_with_defaults() {
        let config: ReaderConfig = serde_json::from_str(r#"{"platform": "darwin"}"#).unwrap();
        assert_eq!(config.platform, Some(Platform::MacOs));
        assert_eq!(config.keychain_service, "Claude Code-credentials");
        assert_eq!(config.security_program, PathBuf::from("security"));
        assert!(config.home_dir.is_none());
    }
}
