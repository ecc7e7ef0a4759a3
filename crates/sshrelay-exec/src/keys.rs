//! SSH key loading and connection credentials

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{PrivateKey, decode_secret_key};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DestinationError;

/// Upper bound on connect plus authentication
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Location of the relay's private key below the configuration directory
#[must_use]
pub fn key_path(config_dir: &Path) -> PathBuf {
    config_dir.join("ssh").join("id_rsa")
}

/// Read and parse an OpenSSH/PEM private key
///
/// # Errors
/// Returns `DestinationError::KeyLoadError` if the file cannot be read or
/// does not hold an unencrypted private key
pub fn load_private_key(path: &Path) -> Result<PrivateKey, DestinationError> {
    let key_error = |reason: String| DestinationError::KeyLoadError {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| key_error(e.to_string()))?;
    warn_if_permissions_open(path);

    let key = decode_secret_key(&text, None).map_err(|e| key_error(e.to_string()))?;
    debug!(path = %path.display(), algorithm = %key.algorithm(), "loaded private key");
    Ok(key)
}

#[cfg(unix)]
fn warn_if_permissions_open(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        // group or other bits set
        if metadata.permissions().mode() & 0o77 != 0 {
            warn!(path = %path.display(), "private key permissions too open (should be 600)");
        }
    }
}

#[cfg(not(unix))]
fn warn_if_permissions_open(_path: &Path) {}

/// How the server's host key is checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HostKeyPolicy {
    /// Accept any host key without verification
    #[default]
    InsecureAcceptAny,
    /// Require the key to be listed in an OpenSSH `known_hosts` file
    KnownHosts {
        /// Path to the `known_hosts` file
        path: PathBuf,
    },
}

const INSECURE_ACCEPT_ANY: &str = "insecure-accept-any";
const KNOWN_HOSTS_PREFIX: &str = "known-hosts:";

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == INSECURE_ACCEPT_ANY {
            return Ok(Self::InsecureAcceptAny);
        }
        match s.strip_prefix(KNOWN_HOSTS_PREFIX).map(str::trim) {
            Some(path) if !path.is_empty() => Ok(Self::KnownHosts { path: path.into() }),
            _ => Err(format!(
                "invalid host key policy {s:?}: expected '{INSECURE_ACCEPT_ANY}' or '{KNOWN_HOSTS_PREFIX}<path>'"
            )),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsecureAcceptAny => f.write_str(INSECURE_ACCEPT_ANY),
            Self::KnownHosts { path } => write!(f, "{KNOWN_HOSTS_PREFIX}{}", path.display()),
        }
    }
}

impl TryFrom<String> for HostKeyPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostKeyPolicy> for String {
    fn from(policy: HostKeyPolicy) -> Self {
        policy.to_string()
    }
}

/// Everything needed to log in to a destination
#[derive(Clone)]
pub struct SshCredentials {
    /// Login name
    pub user: String,
    /// Private key for public key authentication
    pub key: Arc<PrivateKey>,
    /// Upper bound on connect plus authentication
    pub dial_timeout: Duration,
    /// Host key verification
    pub host_key_policy: HostKeyPolicy,
}

impl SshCredentials {
    /// Create credentials with the default dial timeout and host key policy
    pub fn new(user: impl Into<String>, key: PrivateKey) -> Self {
        Self {
            user: user.into(),
            key: Arc::new(key),
            dial_timeout: DIAL_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Set dial timeout
    #[must_use]
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }
}

impl fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredentials")
            .field("user", &self.user)
            .field("key", &self.key.algorithm())
            .field("dial_timeout", &self.dial_timeout)
            .field("host_key_policy", &self.host_key_policy)
            .finish()
    }
}
