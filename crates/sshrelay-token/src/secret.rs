//! Shared HMAC secret as delivered by the secret store

use std::fmt;

use crate::error::AuthError;

/// Token signing secret in its transport encoding (hex text)
///
/// The bytes are kept exactly as fetched and only decoded at the point of
/// use, so a badly encoded secret surfaces as
/// [`AuthError::InvalidSecretEncoding`] from whichever operation touches it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    /// Wrap a hex-encoded secret
    pub fn new(encoded: impl Into<Vec<u8>>) -> Self {
        Self(encoded.into())
    }

    /// Build a secret from raw key bytes
    #[must_use]
    pub fn from_key(key: &[u8]) -> Self {
        Self(hex::encode(key).into_bytes())
    }

    /// Decode to the raw HMAC key
    ///
    /// # Errors
    /// Returns `AuthError::InvalidSecretEncoding` if the value is not hex
    pub fn key_bytes(&self) -> Result<Vec<u8>, AuthError> {
        let text = std::str::from_utf8(&self.0)
            .map_err(|e| AuthError::InvalidSecretEncoding(e.to_string()))?;
        let key = hex::decode(text.trim())
            .map_err(|e| AuthError::InvalidSecretEncoding(e.to_string()))?;
        if key.is_empty() {
            return Err(AuthError::InvalidSecretEncoding("secret is empty".to_string()));
        }
        Ok(key)
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}
