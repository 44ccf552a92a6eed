//! Secret store port and the environment-backed adapter
//!
//! Vendor credentials are looked up by path, e.g. `"deepgram/api_key"`.
//! The environment adapter maps that to `DEEPGRAM_API_KEY`.

use std::env;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::InfrastructureError;

/// Source of vendor credentials
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up a secret by key path
    ///
    /// Returns `Ok(None)` when the secret is simply absent; errors are
    /// reserved for a store that cannot answer.
    async fn get_secret(&self, key: &str) -> Result<Option<String>, InfrastructureError>;
}

/// Secret store that reads from environment variables
///
/// Keys are transformed to uppercase with slashes and hyphens replaced by
/// underscores. For example: "azure/speech-key" becomes "AZURE_SPEECH_KEY"
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    /// Optional prefix for all environment variable lookups
    prefix: Option<String>,
}

impl EnvSecretStore {
    /// Create a new environment secret store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a prefix for all environment variable lookups
    ///
    /// # Example
    /// ```
    /// use infrastructure::EnvSecretStore;
    ///
    /// let store = EnvSecretStore::with_prefix("CALLVOICE");
    /// // Looking up "openai/api_key" will check "CALLVOICE_OPENAI_API_KEY"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn key_to_env_var(&self, key: &str) -> String {
        let normalized = key.replace(['/', '-'], "_").to_uppercase();

        match &self.prefix {
            Some(prefix) => format!("{prefix}_{normalized}"),
            None => normalized,
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    #[instrument(skip(self), fields(env_var))]
    async fn get_secret(&self, key: &str) -> Result<Option<String>, InfrastructureError> {
        let env_var = self.key_to_env_var(key);
        tracing::Span::current().record("env_var", env_var.as_str());

        match env::var(&env_var) {
            Ok(value) if value.trim().is_empty() => {
                debug!("Ignoring empty secret");
                Ok(None)
            },
            Ok(value) => {
                debug!("Retrieved secret from environment variable");
                Ok(Some(value))
            },
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(InfrastructureError::Secret(format!(
                "secret contains invalid UTF-8: {env_var}"
            ))),
        }
    }
}
