//! Classified result of a remote command

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Status reported when the command did not produce an exit code
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

const SSH_ERROR: &str = "SSH Error";
const COMMAND_TIMEOUT: &str = "Command Timeout";

/// Outcome of one remote execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Remote exit code, or -1 for transport/session failure
    pub status: i32,
    /// Human readable classification of `status`
    pub reason: String,
    /// Captured stdout, absent when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Captured stderr, absent when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Failure message, absent unless the execution failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Remote process exited with `code`
    #[must_use]
    pub fn exited(code: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            status: code,
            reason: exit_reason(code).into_owned(),
            stdout: captured(stdout),
            stderr: captured(stderr),
            error: None,
        }
    }

    /// Execution failed before an exit code was known
    #[must_use]
    pub fn failed(error: &ExecError, stdout: &[u8], stderr: &[u8]) -> Self {
        let reason = match error {
            ExecError::Timeout { .. } => COMMAND_TIMEOUT,
            _ => SSH_ERROR,
        };
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            reason: reason.to_string(),
            stdout: captured(stdout),
            stderr: captured(stderr),
            error: Some(error.to_string()),
        }
    }

    /// Classify the end of a command run
    #[must_use]
    pub fn classify(result: Result<i32, ExecError>, stdout: &[u8], stderr: &[u8]) -> Self {
        match result {
            Ok(code) => Self::exited(code, stdout, stderr),
            Err(e) => Self::failed(&e, stdout, stderr),
        }
    }

    /// Exit code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Reason phrase for an exit code
#[must_use]
pub fn exit_reason(code: i32) -> Cow<'static, str> {
    let reason = match code {
        0 => "OK",
        1 => "General Error",
        2 => "Invalid Usage",
        126 => "Command Cannot Execute",
        127 => "Command Not Found",
        128 => "Invalid Exit Argument",
        130 => "Terminated by Signal",
        137 => "Killed by Signal",
        255 => "SSH Connection/Authorization Failed",
        n => return Cow::Owned(format!("Exit Code {n}")),
    };
    Cow::Borrowed(reason)
}

fn captured(bytes: &[u8]) -> Option<String> {
    (!bytes.is_empty()).then(|| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_exit_reason_table() {
        assert_eq!(exit_reason(0), "OK");
        assert_eq!(exit_reason(1), "General Error");
        assert_eq!(exit_reason(2), "Invalid Usage");
        assert_eq!(exit_reason(126), "Command Cannot Execute");
        assert_eq!(exit_reason(127), "Command Not Found");
        assert_eq!(exit_reason(128), "Invalid Exit Argument");
        assert_eq!(exit_reason(130), "Terminated by Signal");
        assert_eq!(exit_reason(137), "Killed by Signal");
        assert_eq!(exit_reason(255), "SSH Connection/Authorization Failed");
        assert_eq!(exit_reason(42), "Exit Code 42");
    }

    #[test]
    fn test_only_exit_zero_is_success() {
        assert!(!ExecutionOutcome::exited(1, b"", b"").success());
        assert!(!ExecutionOutcome::exited(130, b"", b"").success());
        assert!(!ExecutionOutcome::failed(&ExecError::MissingExitStatus, b"", b"").success());
    }

    #[test]
    fn test_success_outcome() {
        let outcome = ExecutionOutcome::classify(Ok(0), b"hello\n", b"");
        assert!(outcome.success());
        assert_eq!(outcome.reason, "OK");
        assert_eq!(outcome.stdout.as_deref(), Some("hello\n"));
        assert_eq!(outcome.stderr, None);
        assert_eq!(outcome.error, None);
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let outcome = ExecutionOutcome::classify(Ok(127), b"", b"sh: nope: not found\n");
        assert_eq!(outcome.status, 127);
        assert_eq!(outcome.reason, "Command Not Found");
        assert_eq!(outcome.error, None);
        assert!(outcome.stderr.is_some());
    }

    #[test]
    fn test_transport_failure() {
        let outcome = ExecutionOutcome::classify(
            Err(ExecError::Transport("channel closed".to_string())),
            b"partial",
            b"",
        );
        assert_eq!(outcome.status, TRANSPORT_FAILURE_STATUS);
        assert_eq!(outcome.reason, "SSH Error");
        assert_eq!(outcome.error.as_deref(), Some("session error: channel closed"));
        assert_eq!(outcome.stdout.as_deref(), Some("partial"));
    }

    #[test]
    fn test_timeout_failure() {
        let outcome = ExecutionOutcome::failed(
            &ExecError::Timeout {
                timeout: Duration::from_secs(5),
            },
            b"",
            b"",
        );
        assert_eq!(outcome.status, TRANSPORT_FAILURE_STATUS);
        assert_eq!(outcome.reason, "Command Timeout");
        assert_eq!(outcome.error.as_deref(), Some("command timed out after 5s"));
    }

    #[test]
    fn test_empty_streams_omitted_from_json() {
        let json = serde_json::to_value(ExecutionOutcome::exited(0, b"", b"")).unwrap();
        assert_eq!(json, serde_json::json!({"status": 0, "reason": "OK"}));
    }
}
