//! Result object written at the process boundary

use serde::{Deserialize, Serialize};
use sshrelay_exec::{ExecutionOutcome, TRANSPORT_FAILURE_STATUS};

/// Reason used for failures that happen before the command runs
pub const EXECUTOR_ERROR: &str = "Executor Error";

/// One invocation's result
///
/// Built once by [`RelayResponse::assemble`] or [`RelayResponse::executor_error`]
/// and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    correlation_id: String,
    status: i32,
    reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

impl RelayResponse {
    /// Merge the correlation id, a refreshed token (if any) and the outcome
    pub fn assemble(
        correlation_id: impl Into<String>,
        auth_token: Option<String>,
        outcome: ExecutionOutcome,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: outcome.status,
            reason: outcome.reason,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            error: outcome.error,
            auth_token,
        }
    }

    /// Failure before the remote command was attempted
    pub fn executor_error(correlation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: TRANSPORT_FAILURE_STATUS,
            reason: EXECUTOR_ERROR.to_string(),
            stdout: None,
            stderr: None,
            error: Some(message.into()),
            auth_token: None,
        }
    }

    /// Correlation id
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Exit classification
    #[must_use]
    pub fn status(&self) -> i32 {
        self.status
    }

    /// Reason phrase
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Captured stdout
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        self.stdout.as_deref()
    }

    /// Captured stderr
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    /// Failure message
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Refreshed token
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Serialize to a single JSON line
    ///
    /// # Errors
    /// Returns the serializer error, which only happens on a broken writer
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_assemble_with_refreshed_token() {
        let outcome = ExecutionOutcome::exited(0, b"up 3 days\n", b"");
        let response = RelayResponse::assemble("cid-1", Some("new.jwt.token".to_string()), outcome);

        let value: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "correlationId": "cid-1",
                "status": 0,
                "reason": "OK",
                "stdout": "up 3 days\n",
                "authToken": "new.jwt.token"
            })
        );
    }

    #[test]
    fn test_assemble_without_refresh_omits_token() {
        let outcome = ExecutionOutcome::exited(42, b"", b"boom");
        let response = RelayResponse::assemble("cid-2", None, outcome);

        assert_eq!(response.auth_token(), None);
        assert_eq!(response.reason(), "Exit Code 42");
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("authToken").is_none());
        assert!(value.get("stdout").is_none());
        assert_eq!(value["stderr"], "boom");
    }

    #[test]
    fn test_executor_error() {
        let response = RelayResponse::executor_error("cid-3", "invalid JWT");
        assert_eq!(response.status(), -1);
        assert_eq!(response.reason(), EXECUTOR_ERROR);
        assert_eq!(response.error(), Some("invalid JWT"));
        assert_eq!(response.correlation_id(), "cid-3");
    }
}
