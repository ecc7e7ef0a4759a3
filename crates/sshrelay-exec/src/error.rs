//! Error types for sshrelay-exec

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving a destination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    /// Destination string cannot be interpreted
    #[error("invalid ssh destination: {0}")]
    InvalidDestination(String),

    /// URI form without a host
    #[error("invalid ssh URI: missing host")]
    MissingHost,

    /// Private key missing, unreadable or unparsable
    #[error("failed to load private key {path}: {reason}")]
    KeyLoadError {
        /// Key file that was tried
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
}

/// Errors that can occur during remote execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// TCP connect or SSH handshake failed
    #[error("failed to connect: {0}")]
    ConnectionFailed(String),

    /// Connection and authentication did not finish within the dial timeout
    #[error("failed to connect: timed out after {timeout:?}")]
    DialTimeout {
        /// Dial timeout that was exceeded
        timeout: Duration,
    },

    /// Authentication failed
    #[error("failed to connect: authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Session channel could not be opened
    #[error("failed to create session: {0}")]
    SessionFailed(String),

    /// Session broke while the command was running
    #[error("session error: {0}")]
    Transport(String),

    /// Channel closed without exit status or exit signal
    #[error("remote command exited without exit status or exit signal")]
    MissingExitStatus,

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}
