//! Per-invocation pipeline
//!
//! validate token -> refresh token -> resolve destination -> execute ->
//! assemble response. The first failing stage ends the invocation with an
//! `Executor Error` result; later stages are never reached.

use std::net::IpAddr;

use sshrelay_exec::{ExecutionOutcome, RemoteExecutor, resolve};
use sshrelay_token::{TokenSecret, refresh, validate};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::response::RelayResponse;
use crate::secrets::SecretProvider;

/// Inputs handed over by the command line layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Destination string, `[user@]host` or `ssh://[user@]host[:port]`
    pub destination: String,
    /// Command for the remote shell
    pub command: String,
    /// `Authorization` header value
    pub authorization: String,
    /// Caller supplied correlation id
    pub correlation_id: Option<String>,
    /// Overrides the configured location
    pub location: Option<String>,
    /// Client address chain, for the log only
    pub client_ips: Vec<IpAddr>,
}

/// The relay: configuration plus its two collaborators
#[derive(Debug)]
pub struct Relay<S, E> {
    config: RelayConfig,
    secrets: S,
    executor: E,
}

impl<S, E> Relay<S, E>
where
    S: SecretProvider,
    E: RemoteExecutor,
{
    /// Create a relay
    pub fn new(config: RelayConfig, secrets: S, executor: E) -> Self {
        Self {
            config,
            secrets,
            executor,
        }
    }

    /// Run one invocation to completion
    ///
    /// Never fails; every error is reported inside the response.
    pub async fn handle(&self, invocation: Invocation) -> RelayResponse {
        let correlation_id = invocation
            .correlation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

        let span = info_span!("invocation", correlation_id = %correlation_id);

        async move {
            match self.run(&invocation).await {
                Ok((outcome, auth_token)) => {
                    if outcome.success() {
                        info!(refreshed = auth_token.is_some(), "remote command succeeded");
                    } else {
                        warn!(
                            status = outcome.status,
                            reason = %outcome.reason,
                            error = outcome.error.as_deref(),
                            "remote command failed"
                        );
                    }
                    RelayResponse::assemble(correlation_id, auth_token, outcome)
                }
                Err(e) => {
                    error!(error = %e, "invocation failed");
                    RelayResponse::executor_error(correlation_id, e.public_message())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        invocation: &Invocation,
    ) -> Result<(ExecutionOutcome, Option<String>), RelayError> {
        let config = self
            .config
            .clone()
            .with_location(invocation.location.as_deref());
        config.validate()?;

        info!(
            destination = %invocation.destination,
            command = %invocation.command,
            client_ips = ?invocation.client_ips,
            "relay request"
        );

        let secret = if has_token(&invocation.authorization) {
            let bytes = self
                .secrets
                .fetch_secret(&config.vault_endpoint, &config.secret_name)
                .await?;
            debug!("token secret fetched");
            TokenSecret::new(bytes)
        } else {
            TokenSecret::new(Vec::new())
        };

        let verified = validate(&invocation.authorization, &secret, &config.location)?;
        info!(sub = verified.claims.subject(), "token validated");

        let refreshed = refresh(
            &verified.claims,
            &verified.raw,
            &secret,
            &config.location,
            config.refresh_policy(),
        )
        .map_err(RelayError::Refresh)?;

        let target = resolve(
            &invocation.destination,
            &config.config_dir,
            config.host_key_policy.clone(),
        )?;

        info!(
            executor = self.executor.executor_type(),
            address = %target.address(),
            "executing remote command"
        );
        let outcome = self.executor.execute(&target, &invocation.command).await;

        Ok((outcome, refreshed.refreshed.then_some(refreshed.token)))
    }
}

/// Whether the header carries anything once the `Bearer ` prefix is gone
fn has_token(authorization: &str) -> bool {
    !authorization
        .strip_prefix("Bearer ")
        .unwrap_or(authorization)
        .trim()
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_token() {
        assert!(has_token("Bearer abc"));
        assert!(has_token("abc"));
        assert!(!has_token(""));
        assert!(!has_token("Bearer   "));
    }
}
