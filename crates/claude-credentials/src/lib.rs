//! Claude CLI credential reader
//!
//! Locates the OAuth credentials the Claude CLI stores on this machine and
//! reports whether the access token has expired. Windows and Linux keep a
//! JSON file at `~/.claude/.credentials.json`; macOS keeps the same JSON
//! document in the login keychain under `Claude Code-credentials`.
//!
//! Usage:
//! 1. Build a `ReaderConfig` (or take the default) and resolve the
//!    `Environment` for its platform
//! 2. `CredentialReader::from_config()` picks the file or keychain source
//! 3. `retrieve_credentials()` loads the `CredentialBundle`, reporting any
//!    failure once through the injected `Diagnostics`
//! 4. `is_expired()` compares the token's `expiresAt` against the clock

pub mod clock;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod platform;
pub mod reader;
pub mod source;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use constants::*;
pub use diagnostics::{ConsoleDiagnostics, Diagnostics, TracingDiagnostics, failure_message};
pub use error::{Error, Result};
pub use platform::{Environment, Platform};
pub use reader::{CredentialReader, ReaderConfig};
pub use source::{
    CommandOutput, CredentialSource, FileSource, KeychainCommand, KeychainSource, SecurityCli,
    SourceKind, UnresolvedSource, UnsupportedSource,
};
pub use token::{CredentialBundle, ExpiryCheck, OAuthToken, TokenReport, iso8601};
