//! Core error types for sshrelay-core

use sshrelay_exec::DestinationError;
use sshrelay_token::AuthError;
use thiserror::Error;

/// Errors from the secret provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// Vault endpoint or secret name not configured
    #[error("vault endpoint or secret name not set")]
    NotConfigured,

    /// Endpoint scheme this build cannot talk to
    #[error("unsupported vault endpoint: {0}")]
    UnsupportedEndpoint(String),

    /// Secret could not be read
    #[error("failed to read secret {name}: {reason}")]
    ReadFailed {
        /// Secret name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Secret exists but holds nothing
    #[error("secret {0} is empty")]
    Empty(String),
}

/// Invalid relay configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required setting empty or missing
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Setting present but unusable
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Terminal failure of one relay invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Configuration did not validate
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Secret provider failed
    #[error("secret fetch failed: {0}")]
    Secret(#[from] SecretError),

    /// Bearer token rejected
    #[error("token rejected: {0}")]
    Auth(#[from] AuthError),

    /// Token valid but could not be reissued
    #[error("token refresh failed: {0}")]
    Refresh(AuthError),

    /// Destination could not be resolved
    #[error("destination error: {0}")]
    Destination(#[from] DestinationError),
}

impl RelayError {
    /// Message placed in the result object
    ///
    /// Token and destination details stay in the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Config(e) => format!("invalid configuration: {e}"),
            Self::Secret(e) => format!("failed to fetch JWT secret: {e}"),
            Self::Auth(_) => "invalid JWT".to_string(),
            Self::Refresh(_) => "token refresh failed".to_string(),
            Self::Destination(_) => "invalid SSH destination".to_string(),
        }
    }
}
