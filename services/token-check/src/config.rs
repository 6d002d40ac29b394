//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The config file is optional unless named explicitly via `--config` or
//! `CONFIG_PATH`; a missing default file means all defaults.

use std::path::{Path, PathBuf};

use claude_credentials::ReaderConfig;
use serde::Deserialize;

/// Config file looked up in the working directory when none is named.
pub const DEFAULT_CONFIG_PATH: &str = "claude-token-check.toml";

/// Overrides `credentials.credentials_path` from the config file.
pub const CREDENTIALS_PATH_ENV: &str = "CLAUDE_CREDENTIALS_PATH";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Emit `[DEBUG]` diagnostics (also enabled by `--debug`)
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub credentials: ReaderConfig,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), otherwise the default file
    /// when present, otherwise defaults plus environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> common::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(&default_path);
        }
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(CREDENTIALS_PATH_ENV)
            && !path.trim().is_empty()
        {
            self.credentials.credentials_path = Some(PathBuf::from(path.trim()));
        }
    }

    fn validate(&self) -> common::Result<()> {
        let creds = &self.credentials;

        if creds.keychain_service.trim().is_empty() {
            return Err(common::Error::Config(
                "keychain_service must not be empty".into(),
            ));
        }

        if creds.security_program.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "security_program must not be empty".into(),
            ));
        }

        if let Some(home) = &creds.home_dir
            && !home.is_absolute()
        {
            return Err(common::Error::Config(format!(
                "home_dir must be an absolute path, got: {}",
                home.display()
            )));
        }

        Ok(())
    }
}
