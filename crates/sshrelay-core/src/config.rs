//! Configuration consumed by the relay pipeline

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sshrelay_exec::HostKeyPolicy;
use sshrelay_token::RefreshPolicy;

use crate::error::ConfigError;

/// Settings for one relay invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Secret store endpoint (directory or `file://` URL of mounted secrets)
    #[serde(default)]
    pub vault_endpoint: String,
    /// Name of the secret holding the hex-encoded token key
    #[serde(default)]
    pub secret_name: String,
    /// Service configuration directory; the SSH key lives in `ssh/id_rsa` below it
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Deployment location; tokens must carry it as `sub`
    #[serde(default)]
    pub location: String,
    /// Lifetime of a refreshed token, in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Refresh tokens expiring within this many seconds
    #[serde(default = "default_refresh_window")]
    pub refresh_window_secs: u64,
    /// Host key verification for outgoing SSH connections
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    /// Abort remote commands after this many seconds
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            vault_endpoint: String::new(),
            secret_name: String::new(),
            config_dir: default_config_dir(),
            location: String::new(),
            token_ttl_secs: default_token_ttl(),
            refresh_window_secs: default_refresh_window(),
            host_key_policy: HostKeyPolicy::default(),
            command_timeout_secs: None,
            log_level: default_log_level(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/usr/local/etc/webhook")
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_refresh_window() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
    /// Check that every setting the pipeline needs is present and sane
    ///
    /// # Errors
    /// Returns the first offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("vault_endpoint"));
        }
        if self.secret_name.trim().is_empty() {
            return Err(ConfigError::Missing("secret_name"));
        }
        if self.config_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("config_dir"));
        }
        if self.location.trim().is_empty() {
            return Err(ConfigError::Missing("location"));
        }
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "token_ttl_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.refresh_window_secs >= self.token_ttl_secs {
            return Err(ConfigError::Invalid {
                name: "refresh_window_secs",
                reason: format!(
                    "must be shorter than token_ttl_secs ({})",
                    self.token_ttl_secs
                ),
            });
        }
        if self.command_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                name: "command_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Replace the location when an override is given
    #[must_use]
    pub fn with_location(mut self, location: Option<&str>) -> Self {
        if let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) {
            self.location = location.to_string();
        }
        self
    }

    /// Refresh window and ttl
    #[must_use]
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy::new(
            Duration::from_secs(self.refresh_window_secs),
            Duration::from_secs(self.token_ttl_secs),
        )
    }

    /// Remote command timeout, if configured
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
