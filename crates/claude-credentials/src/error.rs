//! Error types for credential retrieval

/// Errors from reading the Claude CLI credential store.
///
/// `CredentialReader::retrieve_credentials` reports these once and collapses
/// them to `None`; `CredentialReader::load` returns them as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("keychain lookup could not run: {0}")]
    KeychainUnavailable(String),

    #[error("keychain lookup failed: {0}")]
    KeychainLookup(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("missing environment: {0}")]
    MissingEnvironment(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
