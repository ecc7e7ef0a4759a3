//! sshrelay-token: bearer token validation and refresh
//!
//! Verifies HMAC-signed JWTs presented to the relay and reissues them when
//! they are close to expiry, carrying every custom claim across unchanged.

pub mod claims;
pub mod error;
pub mod refresh;
pub mod secret;
pub mod validate;

pub use claims::Claims;
pub use error::AuthError;
pub use refresh::{RefreshPolicy, RefreshedToken, refresh};
pub use secret::TokenSecret;
pub use validate::{SERVICE_ISSUER, VerifiedToken, validate};
