//! Credential sources
//!
//! One `CredentialSource` per storage strategy: a JSON file for Windows and
//! Linux, the login keychain for macOS. The reader picks one at construction
//! time and never switches.
//!
//! The keychain is queried by shelling out to `security find-generic-password
//! -w`, which prints the stored secret (the same JSON document the file
//! strategy reads) on stdout. The external program sits behind
//! `KeychainCommand` so the exit-status handling can be exercised without a
//! keychain.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::constants::KEYCHAIN_NOT_FOUND_MARKER;
use crate::error::{Error, Result};
use crate::token::CredentialBundle;

/// Which storage a source reads, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File(PathBuf),
    Keychain { service: String, account: String },
    Unsupported(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "credential file {}", path.display()),
            Self::Keychain { .. } => f.write_str("keychain"),
            Self::Unsupported(os) => write!(f, "unsupported platform {os}"),
        }
    }
}

/// A place credentials can be loaded from.
pub trait CredentialSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Make a single attempt to read and parse the credential document.
    fn load(&self) -> Result<CredentialBundle>;
}

/// Reads `<home>/.claude/.credentials.json`.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File(self.path.clone())
    }

    fn load(&self) -> Result<CredentialBundle> {
        debug!(path = %self.path.display(), "reading credential file");
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Io(format!("reading {}: {e}", self.path.display())))?;
        CredentialBundle::from_json(&contents)
    }
}

/// Captured result of a keychain query process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs the keychain lookup for a generic password.
///
/// `Err` means the lookup could not be started at all; a lookup that ran and
/// failed is an `Ok` with `success == false`.
pub trait KeychainCommand: Send + Sync {
    fn find_generic_password(
        &self,
        service: &str,
        account: &str,
    ) -> std::io::Result<CommandOutput>;
}

/// The macOS `security` command-line tool.
#[derive(Debug, Clone)]
pub struct SecurityCli {
    program: PathBuf,
}

impl SecurityCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl KeychainCommand for SecurityCli {
    fn find_generic_password(
        &self,
        service: &str,
        account: &str,
    ) -> std::io::Result<CommandOutput> {
        debug!(program = %self.program.display(), service, account, "querying keychain");
        // Blocks until the process exits; no timeout.
        let output = Command::new(&self.program)
            .args(["find-generic-password", "-s", service, "-a", account, "-w"])
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Reads the credential document from the macOS login keychain.
pub struct KeychainSource {
    service: String,
    account: String,
    command: Box<dyn KeychainCommand>,
}

impl KeychainSource {
    pub fn new(
        service: impl Into<String>,
        account: impl Into<String>,
        command: Box<dyn KeychainCommand>,
    ) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            command,
        }
    }
}

impl CredentialSource for KeychainSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Keychain {
            service: self.service.clone(),
            account: self.account.clone(),
        }
    }

    fn load(&self) -> Result<CredentialBundle> {
        let output = self
            .command
            .find_generic_password(&self.service, &self.account)
            .map_err(|e| {
                Error::KeychainUnavailable(format!(
                    "failed to run `security find-generic-password`: {e}"
                ))
            })?;

        if !output.success {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // `security` has no dedicated exit code for a missing item; its
            // stderr wording is the only signal.
            if stderr.contains(KEYCHAIN_NOT_FOUND_MARKER) {
                return Err(Error::NotFound(format!(
                    "no keychain item for service \"{}\" and account \"{}\"",
                    self.service, self.account
                )));
            }
            let status = output
                .code
                .map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
            // Diagnostics are single-line; fold multi-line tool output.
            let detail = stderr.split_whitespace().collect::<Vec<_>>().join(" ");
            return Err(Error::KeychainLookup(format!(
                "`security find-generic-password` exited with {status}: {detail}"
            )));
        }

        let secret = String::from_utf8(output.stdout)
            .map_err(|e| Error::CredentialParse(format!("keychain secret is not UTF-8: {e}")))?;
        CredentialBundle::from_json(secret.trim())
    }
}

/// Stand-in for platforms with no known credential location. Never touches
/// the filesystem or spawns anything.
#[derive(Debug, Clone)]
pub struct UnsupportedSource {
    os: String,
}

impl UnsupportedSource {
    pub fn new(os: impl Into<String>) -> Self {
        Self { os: os.into() }
    }
}

impl CredentialSource for UnsupportedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Unsupported(self.os.clone())
    }

    fn load(&self) -> Result<CredentialBundle> {
        Err(Error::UnsupportedPlatform(self.os.clone()))
    }
}

/// A store whose location depends on environment that is not available,
/// such as an unset home directory. Every load fails with
/// `Error::MissingEnvironment` without touching the filesystem.
#[derive(Debug, Clone)]
pub struct UnresolvedSource {
    kind: SourceKind,
    missing: String,
}

impl UnresolvedSource {
    pub fn new(kind: SourceKind, missing: impl Into<String>) -> Self {
        Self {
            kind,
            missing: missing.into(),
        }
    }
}

impl CredentialSource for UnresolvedSource {
    fn kind(&self) -> SourceKind {
        self.kind.clone()
    }

    fn load(&self) -> Result<CredentialBundle> {
        Err(Error::MissingEnvironment(self.missing.clone()))
    }
}
