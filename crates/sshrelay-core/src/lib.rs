//! sshrelay-core: the relay pipeline
//!
//! Wires token validation and refresh, destination resolution and remote
//! execution into one invocation and assembles the result object that is
//! written at the process boundary.

pub mod config;
pub mod error;
pub mod relay;
pub mod response;
pub mod secrets;

pub use config::RelayConfig;
pub use error::{ConfigError, RelayError, SecretError};
pub use relay::{Invocation, Relay};
pub use response::RelayResponse;
pub use secrets::{MountedSecretProvider, SecretProvider};
