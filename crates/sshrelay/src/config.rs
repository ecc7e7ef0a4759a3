//! Configuration loading
//!
//! An optional TOML file provides the base settings, `WEBHOOK_*`
//! environment variables override them.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use sshrelay_core::RelayConfig;

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Relay settings
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).wrap_err_with(|| format!("cannot parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from the explicit path, the default paths, or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("SSHRELAY_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let paths = [
            Some(PathBuf::from("sshrelay.toml")),
            Some(PathBuf::from("/etc/sshrelay/sshrelay.toml")),
            dirs::config_dir().map(|p| p.join("sshrelay/sshrelay.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}

/// Apply `WEBHOOK_*` overrides using `lookup` to read variables
///
/// # Errors
/// Returns error if a numeric or policy variable does not parse
pub fn apply_env<F>(mut config: RelayConfig, lookup: F) -> eyre::Result<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("WEBHOOK_KEYVAULT_URL") {
        config.vault_endpoint = v;
    }
    if let Some(v) = var("WEBHOOK_SECRET_NAME") {
        config.secret_name = v;
    }
    if let Some(v) = var("WEBHOOK_CONFIG") {
        config.config_dir = PathBuf::from(v);
    }
    if let Some(v) = var("WEBHOOK_LOCATION") {
        config.location = v;
    }
    if let Some(v) = var("WEBHOOK_TOKEN_TTL") {
        config.token_ttl_secs = parse_var("WEBHOOK_TOKEN_TTL", &v)?;
    }
    if let Some(v) = var("WEBHOOK_TOKEN_REFRESH_WINDOW") {
        config.refresh_window_secs = parse_var("WEBHOOK_TOKEN_REFRESH_WINDOW", &v)?;
    }
    if let Some(v) = var("WEBHOOK_HOST_KEY_POLICY") {
        config.host_key_policy = parse_var("WEBHOOK_HOST_KEY_POLICY", &v)?;
    }
    if let Some(v) = var("WEBHOOK_COMMAND_TIMEOUT") {
        config.command_timeout_secs = Some(parse_var("WEBHOOK_COMMAND_TIMEOUT", &v)?);
    }
    if let Some(v) = var("WEBHOOK_LOG_LEVEL") {
        config.log_level = v;
    }

    Ok(config)
}

fn parse_var<T>(name: &str, value: &str) -> eyre::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| eyre::eyre!("{name}={value}: {e}"))
}

/// File, then environment
///
/// # Errors
/// Returns error if the file or an environment override is invalid
pub fn load(explicit: Option<&Path>) -> eyre::Result<RelayConfig> {
    let file = Config::load_default(explicit)?;
    apply_env(file.relay, |name| std::env::var(name).ok())
}
