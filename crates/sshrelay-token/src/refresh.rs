//! Sliding refresh of validated tokens
//!
//! A token inside the refresh window (or without `exp`) is reissued with a
//! fresh `iat`/`exp`. All other claims, custom ones included, are copied
//! as-is and the new token is signed with the original HMAC strength.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tracing::{debug, info, instrument};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::secret::TokenSecret;
use crate::validate::{check_subject, header_algorithm, hmac_algorithm};

/// Used when the original token's algorithm cannot be read back
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS512;

/// When to reissue and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Reissue once the remaining lifetime is at or below this
    pub window: Duration,
    /// Lifetime of a reissued token
    pub ttl: Duration,
}

impl RefreshPolicy {
    /// Create a refresh policy
    #[must_use]
    pub fn new(window: Duration, ttl: Duration) -> Self {
        Self { window, ttl }
    }
}

/// Token to hand back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The reissued token, or the original when no refresh happened
    pub token: String,
    /// Whether `token` is newly issued
    pub refreshed: bool,
}

/// Reissue a validated token if it is close to expiry
///
/// `claims` and `raw_token` must come from a successful
/// [`validate`](crate::validate::validate) call; the signature is not checked
/// again here.
///
/// # Errors
/// * `AuthError::InvalidInput` - empty token or zero ttl
/// * `AuthError::InvalidSecretEncoding` - secret is not hex
/// * `AuthError::SubjectMismatch` - `sub` differs from `expected_subject`
/// * `AuthError::SigningFailed` - the new token could not be signed
pub fn refresh(
    claims: &Claims,
    raw_token: &str,
    secret: &TokenSecret,
    expected_subject: &str,
    policy: RefreshPolicy,
) -> Result<RefreshedToken, AuthError> {
    refresh_at(
        claims,
        raw_token,
        secret,
        expected_subject,
        policy,
        Utc::now().timestamp(),
    )
}

#[instrument(skip_all, level = "debug")]
pub(crate) fn refresh_at(
    claims: &Claims,
    raw_token: &str,
    secret: &TokenSecret,
    expected_subject: &str,
    policy: RefreshPolicy,
    now: i64,
) -> Result<RefreshedToken, AuthError> {
    if raw_token.trim().is_empty() {
        return Err(AuthError::InvalidInput("token is empty".to_string()));
    }
    if policy.ttl.is_zero() {
        return Err(AuthError::InvalidInput("token ttl must be positive".to_string()));
    }

    let key = secret.key_bytes()?;

    check_subject(claims, expected_subject)?;

    let window = secs(policy.window);
    if let Some(exp) = claims.exp {
        let remaining = exp.saturating_sub(now);
        if remaining > window {
            debug!(remaining, window, "token outside refresh window");
            return Ok(RefreshedToken {
                token: raw_token.to_string(),
                refreshed: false,
            });
        }
    }

    let algorithm = header_algorithm(raw_token)
        .ok()
        .and_then(|alg| hmac_algorithm(&alg))
        .unwrap_or(DEFAULT_ALGORITHM);

    let reissued = Claims {
        iat: Some(now),
        exp: Some(now.saturating_add(secs(policy.ttl))),
        ..claims.clone()
    };

    let token = encode(
        &Header::new(algorithm),
        &reissued,
        &EncodingKey::from_secret(&key),
    )
    .map_err(|e| AuthError::SigningFailed(e.to_string()))?;

    info!(?algorithm, exp = reissued.exp, "token refreshed");

    Ok(RefreshedToken {
        token,
        refreshed: true,
    })
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
