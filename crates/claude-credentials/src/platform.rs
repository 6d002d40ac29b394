//! Platform detection and process environment inputs
//!
//! The reader never consults the process environment on its own: callers
//! either pass a home directory and username explicitly or ask for them to
//! be resolved once here via `Environment::from_process`.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Where the Claude CLI keeps its credentials, by operating system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Platform {
    /// `%USERPROFILE%\.claude\.credentials.json`
    Windows,
    /// `$HOME/.claude/.credentials.json`
    Linux,
    /// Login keychain, generic password `Claude Code-credentials`
    MacOs,
    Unsupported(String),
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map an OS identifier to a platform. Accepts both Rust target names
    /// (`macos`, `windows`) and the Node.js/Darwin spellings (`darwin`, `win32`).
    pub fn from_os_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" => Self::Windows,
            "linux" => Self::Linux,
            "macos" | "darwin" => Self::MacOs,
            _ => Self::Unsupported(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Unsupported(name) => name,
        }
    }

    /// Environment variable naming the user's home directory.
    pub fn home_var(&self) -> &'static str {
        match self {
            Self::Windows => "USERPROFILE",
            _ => "HOME",
        }
    }
}

impl From<String> for Platform {
    fn from(name: String) -> Self {
        Self::from_os_name(&name)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ambient inputs taken from the invoking user's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub home_dir: Option<PathBuf>,
    pub username: Option<String>,
}

impl Environment {
    /// Read the home directory for `platform` from the process environment
    /// and resolve the invoking user's login name. Empty values count as
    /// unset.
    ///
    /// The username comes from the OS account database for the effective
    /// uid; `USER`, `LOGNAME` and `USERNAME` are consulted only when that
    /// lookup fails, so a stale or spoofed variable cannot redirect the
    /// keychain query.
    pub fn from_process(platform: &Platform) -> Self {
        let home_dir = env_non_empty(platform.home_var()).map(PathBuf::from);
        let username = os_username().or_else(|| {
            ["USER", "LOGNAME", "USERNAME"]
                .into_iter()
                .find_map(env_non_empty)
        });
        Self { home_dir, username }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Login name of the effective uid, from the password database.
#[cfg(unix)]
pub(crate) fn os_username() -> Option<String> {
    use std::ffi::CStr;

    let uid = unsafe { libc::geteuid() };
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: `pwd`, `buf` and `result` outlive the call, and `buf.len()`
        // is the writable length of `buf`.
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }
        // SAFETY: on success `pw_name` points to a NUL-terminated string
        // inside `buf`, which is still alive.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) }
            .to_string_lossy()
            .into_owned();
        return Some(name).filter(|n| !n.trim().is_empty());
    }
}

#[cfg(not(unix))]
pub(crate) fn os_username() -> Option<String> {
    None
}
