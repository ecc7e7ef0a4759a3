//! Bearer token validation
//!
//! Only shared-secret (HMAC) algorithms are accepted. The algorithm is read
//! from the token header before any key is selected, so a header naming an
//! asymmetric algorithm or `none` is refused outright instead of being
//! verified with the HMAC secret as a public key.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::secret::TokenSecret;

/// Issuer that tokens must carry when they carry one at all
pub const SERVICE_ISSUER: &str = "webhook-executor";

const BEARER_PREFIX: &str = "Bearer ";

/// A token that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Token text with the `Bearer ` prefix and whitespace removed
    pub raw: String,
    /// Decoded claims, reused by the refresher
    pub claims: Claims,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

/// Validate an `Authorization` header value
///
/// # Arguments
/// * `header` - Header value, with or without the `Bearer ` prefix
/// * `secret` - Shared secret, hex encoded
/// * `expected_subject` - Required `sub`; empty disables the check
///
/// # Errors
/// Returns the first [`AuthError`] the token trips over
pub fn validate(
    header: &str,
    secret: &TokenSecret,
    expected_subject: &str,
) -> Result<VerifiedToken, AuthError> {
    validate_at(header, secret, expected_subject, Utc::now().timestamp())
}

#[instrument(skip_all, level = "debug")]
pub(crate) fn validate_at(
    header: &str,
    secret: &TokenSecret,
    expected_subject: &str,
    now: i64,
) -> Result<VerifiedToken, AuthError> {
    let raw = header.strip_prefix(BEARER_PREFIX).unwrap_or(header).trim();
    if raw.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    let alg = header_algorithm(raw)?;
    let algorithm = hmac_algorithm(&alg).ok_or(AuthError::UnsupportedAlgorithm(alg))?;

    let key = secret.key_bytes()?;

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let claims = decode::<Claims>(raw, &DecodingKey::from_secret(&key), &validation)
        .map_err(|e| AuthError::SignatureInvalid(e.to_string()))?
        .claims;

    if let Some(exp) = claims.exp {
        if exp <= now {
            return Err(AuthError::TokenExpired(format_timestamp(exp)));
        }
    }

    if let Some(iss) = &claims.iss {
        if iss != SERVICE_ISSUER {
            return Err(AuthError::IssuerMismatch {
                expected: SERVICE_ISSUER.to_string(),
                actual: iss.clone(),
            });
        }
    }

    check_subject(&claims, expected_subject)?;

    debug!(?algorithm, sub = claims.subject(), "token validated");

    Ok(VerifiedToken {
        raw: raw.to_string(),
        claims,
    })
}

/// Fail with `SubjectMismatch` unless `sub` equals a non-empty expectation
pub(crate) fn check_subject(claims: &Claims, expected_subject: &str) -> Result<(), AuthError> {
    if expected_subject.is_empty() || claims.sub.as_deref() == Some(expected_subject) {
        return Ok(());
    }
    Err(AuthError::SubjectMismatch {
        expected: expected_subject.to_string(),
        actual: claims.subject().to_string(),
    })
}

/// Read the `alg` member of the token's JOSE header
pub(crate) fn header_algorithm(token: &str) -> Result<String, AuthError> {
    let segment = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::SignatureInvalid("missing token header".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::SignatureInvalid(format!("malformed token header: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::SignatureInvalid(format!("malformed token header: {e}")))?;

    header
        .alg
        .ok_or_else(|| AuthError::SignatureInvalid("token header has no alg".to_string()))
}

/// Map an `alg` name onto the HMAC family, rejecting everything else
pub(crate) fn hmac_algorithm(alg: &str) -> Option<Algorithm> {
    match alg {
        "HS256" => Some(Algorithm::HS256),
        "HS384" => Some(Algorithm::HS384),
        "HS512" => Some(Algorithm::HS512),
        _ => None,
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0).map_or_else(|| secs.to_string(), |t| t.to_rfc3339())
}
