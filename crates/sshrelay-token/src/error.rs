//! Error types for sshrelay-token

use thiserror::Error;

/// Errors raised while validating or refreshing a bearer token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Header was missing or held only the `Bearer ` prefix
    #[error("missing or empty token")]
    EmptyToken,

    /// Token header names an algorithm other than HS256/HS384/HS512
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Bad signature or malformed token structure
    #[error("token signature invalid: {0}")]
    SignatureInvalid(String),

    /// `exp` is not in the future
    #[error("token expired at {0}")]
    TokenExpired(String),

    /// `iss` present but not ours
    #[error("invalid issuer: expected '{expected}', got '{actual}'")]
    IssuerMismatch {
        /// Issuer this service accepts
        expected: String,
        /// Issuer found in the token
        actual: String,
    },

    /// `sub` absent or different from the configured location
    #[error("invalid subject: expected '{expected}', got '{actual}'")]
    SubjectMismatch {
        /// Location the relay is deployed for
        expected: String,
        /// Subject found in the token (empty when absent)
        actual: String,
    },

    /// Refresh was handed something it cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Secret is not valid hex
    #[error("invalid secret encoding: {0}")]
    InvalidSecretEncoding(String),

    /// Signing the reissued token failed
    #[error("failed to sign refreshed token: {0}")]
    SigningFailed(String),
}
