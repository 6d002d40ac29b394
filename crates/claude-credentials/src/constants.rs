//! Claude CLI credential storage constants
//!
//! Locations and names the Claude CLI uses when it persists its OAuth
//! credentials. None of these are secrets.

/// Directory under the user's home that holds Claude CLI state
pub const CREDENTIALS_DIR: &str = ".claude";

/// Credential file name inside `CREDENTIALS_DIR` (Windows and Linux)
pub const CREDENTIALS_FILE: &str = ".credentials.json";

/// Generic-password service name the Claude CLI writes on macOS
pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

/// macOS keychain query utility
pub const SECURITY_PROGRAM: &str = "security";

/// Substring `security` prints on stderr when no matching item exists.
pub const KEYCHAIN_NOT_FOUND_MARKER: &str = "could not be found";
