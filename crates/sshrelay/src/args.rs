//! Command line arguments
//!
//! Every input can be given as a named flag or positionally. Positional
//! values fill the slots that no flag claimed, in the order destination,
//! command, authorization, correlation id, forwarded-for.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use sshrelay_core::Invocation;
use thiserror::Error;
use tracing::warn;

/// Relay a command to a remote host over SSH
#[derive(Parser, Debug)]
#[command(name = "sshrelay", version, about)]
pub struct Cli {
    /// Destination, `[user@]host` or `ssh://[user@]host[:port]`
    #[arg(long)]
    pub destination: Option<String>,

    /// Command to run on the remote host
    #[arg(long)]
    pub command: Option<String>,

    /// Authorization header value (`Bearer <jwt>`)
    #[arg(long)]
    pub authorization: Option<String>,

    /// Correlation id echoed in the result
    #[arg(long = "correlation-id")]
    pub correlation_id: Option<String>,

    /// Comma separated client address chain
    #[arg(long = "X-Forwarded-For")]
    pub forwarded_for: Option<String>,

    /// Override the configured location
    #[arg(long)]
    pub location: Option<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Positional fallbacks for the flags above
    #[arg(value_name = "ARGS")]
    pub positional: Vec<String>,
}

/// Log line format
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable
    Text,
    /// One JSON object per line
    Json,
}

/// Invalid invocation arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// Required input neither flagged nor positional
    #[error("missing required argument: {0}")]
    Missing(&'static str),

    /// More positional values than open slots
    #[error("unexpected argument: {0}")]
    Unexpected(String),

    /// clap rejected the command line
    #[error("{0}")]
    Parse(String),
}

impl Cli {
    /// Flag values with positionals filled into the empty slots, plus the
    /// first positional that found no slot
    fn merged(&self) -> ([Option<String>; 5], Option<String>) {
        let mut slots = [
            self.destination.clone(),
            self.command.clone(),
            self.authorization.clone(),
            self.correlation_id.clone(),
            self.forwarded_for.clone(),
        ];

        let mut rest = self.positional.iter().cloned();
        for slot in slots.iter_mut().filter(|s| s.is_none()) {
            match rest.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
        (slots, rest.next())
    }

    /// Correlation id after the positional merge
    ///
    /// Available even when the arguments are otherwise rejected.
    pub fn correlation_id(&self) -> Option<String> {
        let ([_, _, _, correlation_id, _], _) = self.merged();
        correlation_id
    }

    /// Merge flags and positionals into an invocation
    ///
    /// # Errors
    /// Returns an error if destination, command or authorization is missing,
    /// or if positionals are left over.
    pub fn into_invocation(self) -> Result<Invocation, ArgumentError> {
        let (slots, extra) = self.merged();
        if let Some(extra) = extra {
            return Err(ArgumentError::Unexpected(extra));
        }

        let [destination, command, authorization, correlation_id, forwarded_for] = slots;
        let required = |value: Option<String>, name: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(ArgumentError::Missing(name))
        };

        Ok(Invocation {
            destination: required(destination, "destination")?,
            command: required(command, "command")?,
            authorization: required(authorization, "authorization")?,
            correlation_id,
            location: self.location,
            client_ips: forwarded_for
                .as_deref()
                .map(parse_forwarded_for)
                .unwrap_or_default(),
        })
    }
}

/// Split an `X-Forwarded-For` value into addresses, dropping invalid entries
pub fn parse_forwarded_for(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(entry, "ignoring invalid X-Forwarded-For entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sshrelay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_named_flags() {
        let invocation = parse(&[
            "--destination",
            "ops@db-01",
            "--command",
            "uptime",
            "--authorization",
            "Bearer abc",
            "--correlation-id",
            "cid-9",
            "--X-Forwarded-For",
            "10.0.0.1, 192.168.1.7",
            "--location",
            "eu-west",
        ])
        .into_invocation()
        .unwrap();

        assert_eq!(invocation.destination, "ops@db-01");
        assert_eq!(invocation.command, "uptime");
        assert_eq!(invocation.authorization, "Bearer abc");
        assert_eq!(invocation.correlation_id.as_deref(), Some("cid-9"));
        assert_eq!(invocation.location.as_deref(), Some("eu-west"));
        assert_eq!(
            invocation.client_ips,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "192.168.1.7".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn test_positional_fallback() {
        let invocation = parse(&["ops@db-01", "df -h", "Bearer abc", "cid-1"])
            .into_invocation()
            .unwrap();

        assert_eq!(invocation.destination, "ops@db-01");
        assert_eq!(invocation.command, "df -h");
        assert_eq!(invocation.authorization, "Bearer abc");
        assert_eq!(invocation.correlation_id.as_deref(), Some("cid-1"));
        assert!(invocation.client_ips.is_empty());
    }

    #[test]
    fn test_positionals_fill_unflagged_slots() {
        let invocation = parse(&["--command", "uptime", "ops@db-01", "Bearer abc"])
            .into_invocation()
            .unwrap();

        assert_eq!(invocation.destination, "ops@db-01");
        assert_eq!(invocation.command, "uptime");
        assert_eq!(invocation.authorization, "Bearer abc");
        assert_eq!(invocation.correlation_id, None);
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            parse(&["ops@db-01", "uptime"]).into_invocation(),
            Err(ArgumentError::Missing("authorization"))
        );
        assert_eq!(
            parse(&["--command", "uptime"]).into_invocation(),
            Err(ArgumentError::Missing("destination"))
        );
        assert_eq!(
            parse(&["ops@db-01", "", "Bearer abc"]).into_invocation(),
            Err(ArgumentError::Missing("command"))
        );
    }

    #[test]
    fn test_too_many_positionals() {
        assert_eq!(
            parse(&["a", "b", "c", "d", "10.0.0.1", "extra"]).into_invocation(),
            Err(ArgumentError::Unexpected("extra".to_string()))
        );
    }

    #[test]
    fn test_forwarded_for_drops_invalid_entries() {
        let ips = parse_forwarded_for("10.0.0.1,not-an-ip, ,::1,300.1.1.1");
        assert_eq!(
            ips,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn test_log_format() {
        assert_eq!(parse(&[]).log_format, LogFormat::Text);
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["sshrelay", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_correlation_id_survives_rejection() {
        let cli = parse(&["--correlation-id", "c1"]);
        assert_eq!(cli.correlation_id().as_deref(), Some("c1"));
        assert!(cli.into_invocation().is_err());

        let cli = parse(&["--destination", "a", "b", "c", "c2", "ip", "extra"]);
        assert_eq!(cli.correlation_id().as_deref(), Some("c2"));
        assert!(cli.into_invocation().is_err());

        assert_eq!(parse(&["a"]).correlation_id(), None);
    }
}
