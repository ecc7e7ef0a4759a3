//! sshrelay
//!
//! Validates a bearer token, runs one command on a remote host over SSH and
//! writes the result as a single JSON line on stdout. Logs go to stderr.

use clap::Parser;
use clap::error::ErrorKind;
use color_eyre::Result;
use sshrelay_core::{MountedSecretProvider, Relay, RelayConfig, RelayResponse};
use sshrelay_exec::SshExecutor;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod args;
mod config;

use args::{ArgumentError, Cli, LogFormat};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => Err(ArgumentError::Parse(clap_message(&e))),
    };

    let log_format = cli.as_ref().map_or(LogFormat::Text, |c| c.log_format);
    let config = config::load(cli.as_ref().ok().and_then(|c| c.config.as_deref()));
    let log_level = config.as_ref().map_or("info", |c| c.log_level.as_str());
    init_tracing(log_format, log_level);

    let response = respond(cli, config).await;
    println!("{}", response.to_json()?);

    Ok(())
}

/// Logs to stderr; `RUST_LOG` wins over the configured level
fn init_tracing(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn respond(cli: Result<Cli, ArgumentError>, config: eyre::Result<RelayConfig>) -> RelayResponse {
    let cli = match cli {
        Ok(cli) => cli,
        Err(e) => return rejected(None, &e),
    };
    let correlation_id = cli.correlation_id();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            let cause = e
                .chain()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(": ");
            error!(error = %cause, "configuration failed to load");
            return RelayResponse::executor_error(
                correlation_id.unwrap_or_else(new_correlation_id),
                format!("invalid configuration: {cause}"),
            );
        }
    };

    let invocation = match cli.into_invocation() {
        Ok(invocation) => invocation,
        Err(e) => return rejected(correlation_id, &e),
    };

    let executor = SshExecutor::new().with_command_timeout(config.command_timeout());
    Relay::new(config, MountedSecretProvider::new(), executor)
        .handle(invocation)
        .await
}

fn rejected(correlation_id: Option<String>, e: &ArgumentError) -> RelayResponse {
    warn!(error = %e, "invalid arguments");
    RelayResponse::executor_error(
        correlation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_correlation_id),
        format!("invalid arguments: {e}"),
    )
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// First line of a clap error without the `error: ` prefix
fn clap_message(e: &clap::Error) -> String {
    let rendered = e.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).trim().to_string()
}
