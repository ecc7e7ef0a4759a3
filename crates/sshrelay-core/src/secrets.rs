//! Secret provider interface and the mounted-secret implementation

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use crate::error::SecretError;

/// Source of the token signing secret
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Fetch `secret_name` from the store at `vault_endpoint`
    async fn fetch_secret(
        &self,
        vault_endpoint: &str,
        secret_name: &str,
    ) -> Result<Vec<u8>, SecretError>;
}

/// Reads secrets mounted into the filesystem by a secret store driver
///
/// The endpoint is a directory (plain path or `file://` URL) and each secret
/// is a file named after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountedSecretProvider;

impl MountedSecretProvider {
    /// Create a new provider
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Directory the endpoint points at
    fn secret_dir(vault_endpoint: &str) -> Result<PathBuf, SecretError> {
        let endpoint = vault_endpoint.trim();
        if endpoint.is_empty() {
            return Err(SecretError::NotConfigured);
        }
        if !endpoint.contains("://") {
            return Ok(PathBuf::from(endpoint));
        }

        let url =
            Url::parse(endpoint).map_err(|_| SecretError::UnsupportedEndpoint(endpoint.to_string()))?;
        if url.scheme() != "file" {
            return Err(SecretError::UnsupportedEndpoint(endpoint.to_string()));
        }
        url.to_file_path()
            .map_err(|()| SecretError::UnsupportedEndpoint(endpoint.to_string()))
    }
}

/// Secret names are single path components
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

#[async_trait]
impl SecretProvider for MountedSecretProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_secret(
        &self,
        vault_endpoint: &str,
        secret_name: &str,
    ) -> Result<Vec<u8>, SecretError> {
        let name = secret_name.trim();
        if name.is_empty() {
            return Err(SecretError::NotConfigured);
        }
        if !is_plain_name(name) {
            return Err(SecretError::ReadFailed {
                name: name.to_string(),
                reason: "secret name must not contain path separators".to_string(),
            });
        }

        let path = Self::secret_dir(vault_endpoint)?.join(name);
        let value = tokio::fs::read(&path)
            .await
            .map_err(|e| SecretError::ReadFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if value.iter().all(u8::is_ascii_whitespace) {
            return Err(SecretError::Empty(name.to_string()));
        }

        debug!(path = %path.display(), "secret read");
        Ok(value)
    }
}
