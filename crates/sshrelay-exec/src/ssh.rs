//! SSH command execution using russh crate

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::{PrivateKeyWithHashAlg, check_known_hosts_path, ssh_key};
use russh::{ChannelMsg, Disconnect, Sig, client};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::destination::Target;
use crate::error::ExecError;
use crate::keys::HostKeyPolicy;
use crate::outcome::ExecutionOutcome;
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct RelayClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl RelayClientHandler {
    fn verify_known_host(&self, path: &Path, key: &ssh_key::PublicKey) -> bool {
        match check_known_hosts_path(&self.host, self.port, key, path) {
            Ok(true) => true,
            Ok(false) => {
                warn!(host = %self.host, known_hosts = %path.display(), "host key not in known_hosts");
                false
            }
            Err(e) => {
                warn!(host = %self.host, known_hosts = %path.display(), error = %e, "host key rejected");
                false
            }
        }
    }
}

impl client::Handler for RelayClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::InsecureAcceptAny => {
                warn!(host = %self.host, "host key verification disabled");
                Ok(true)
            }
            HostKeyPolicy::KnownHosts { path } => {
                Ok(self.verify_known_host(path, server_public_key))
            }
        }
    }
}

/// SSH command executor
///
/// Opens a fresh connection per command and closes it before returning.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    /// Abort the command after this long
    command_timeout: Option<Duration>,
}

impl SshExecutor {
    /// Create a new SSH executor without a command timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the command timeout
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Connect and authenticate, bounded by the dial timeout
    #[instrument(skip_all, fields(address = %target.address()))]
    async fn connect(&self, target: &Target) -> Result<client::Handle<RelayClientHandler>, ExecError> {
        let dial_timeout = target.credentials.dial_timeout;

        timeout(dial_timeout, Self::dial(target))
            .await
            .map_err(|_| ExecError::DialTimeout {
                timeout: dial_timeout,
            })?
    }

    async fn dial(target: &Target) -> Result<client::Handle<RelayClientHandler>, ExecError> {
        let destination = &target.destination;
        let credentials = &target.credentials;

        info!(
            host = %destination.host,
            port = destination.port,
            user = %destination.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());
        let handler = RelayClientHandler {
            host: destination.host.clone(),
            port: destination.port,
            policy: credentials.host_key_policy.clone(),
        };

        let address = destination.address();
        let mut session = client::connect(config, address.as_str(), handler)
            .await
            .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &credentials.user,
                PrivateKeyWithHashAlg::new(Arc::clone(&credentials.key), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(
                "public key authentication rejected".to_string(),
            ));
        }

        info!(host = %destination.host, "SSH connected and authenticated");
        Ok(session)
    }

    /// Run the command, honouring the command timeout
    async fn run(
        &self,
        session: &client::Handle<RelayClientHandler>,
        cmd: &str,
        stdout: &mut Vec<u8>,
        stderr: &mut Vec<u8>,
    ) -> Result<i32, ExecError> {
        let Some(limit) = self.command_timeout else {
            return run_command(session, cmd, stdout, stderr).await;
        };

        let start = Instant::now();
        match timeout(limit, run_command(session, cmd, stdout, stderr)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?limit,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout { timeout: limit })
            }
        }
    }
}

/// Open a session channel, exec `cmd` and collect output until the channel closes
async fn run_command(
    session: &client::Handle<RelayClientHandler>,
    cmd: &str,
    stdout: &mut Vec<u8>,
    stderr: &mut Vec<u8>,
) -> Result<i32, ExecError> {
    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| ExecError::SessionFailed(e.to_string()))?;

    channel
        .exec(true, cmd)
        .await
        .map_err(|e| ExecError::Transport(e.to_string()))?;

    let mut status = None;
    let mut signal = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status.cast_signed()),
            ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            } => {
                debug!(signal = ?signal_name, message = %error_message, "remote exit signal");
                signal = Some(signal_name);
            }
            ChannelMsg::Failure => {
                return Err(ExecError::Transport(
                    "remote refused to execute command".to_string(),
                ));
            }
            _ => {}
        }
    }

    match (status, signal) {
        (Some(code), _) => Ok(code),
        (None, Some(sig)) => Ok(signal_exit_code(&sig)),
        (None, None) => Err(ExecError::MissingExitStatus),
    }
}

/// Shell convention: 128 plus the signal number, 128 when unknown
pub(crate) fn signal_exit_code(sig: &Sig) -> i32 {
    let number = match sig {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        Sig::Custom(name) if name == "USR2" => 12,
        _ => 0,
    };
    128 + number
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, target), fields(address = %target.address()))]
    async fn execute(&self, target: &Target, cmd: &str) -> ExecutionOutcome {
        let start = Instant::now();

        let session = match self.connect(target).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "SSH connection failed");
                return ExecutionOutcome::failed(&e, &[], &[]);
            }
        };

        debug!(command = %cmd, "executing remote command");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = self.run(&session, cmd, &mut stdout, &mut stderr).await;

        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(error = %e, "disconnect failed");
        }

        let outcome = ExecutionOutcome::classify(result, &stdout, &stderr);

        debug!(
            status = outcome.status,
            reason = %outcome.reason,
            duration = ?start.elapsed(),
            "remote command completed"
        );

        outcome
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}
