//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `config.toml` (or an explicit path), then `CALLVOICE__…` environment
//! variables with `__` separating nested keys, e.g.
//! `CALLVOICE__SPEECH__DISPATCH__ATTEMPT_TIMEOUT_MS=900`.

use std::fmt;
use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use speech_dispatch::{AzureConfig, DeepgramConfig, ElevenLabsConfig, OpenAiConfig, SpeechDispatchConfig};
use tracing::{debug, info};

use crate::error::InfrastructureError;
use crate::secrets::SecretStore;
use crate::telemetry::LoggingConfig;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CALLVOICE";

/// Secret paths resolved by [`AppConfig::resolve_credentials`]
pub mod secret_keys {
    /// ElevenLabs API key, `ELEVENLABS_API_KEY` in the environment
    pub const ELEVENLABS_API_KEY: &str = "elevenlabs/api_key";
    /// Azure Speech subscription key, `AZURE_SPEECH_KEY`
    pub const AZURE_SPEECH_KEY: &str = "azure/speech-key";
    /// Azure Speech region, `AZURE_SPEECH_REGION`
    pub const AZURE_SPEECH_REGION: &str = "azure/speech-region";
    /// Deepgram API key, `DEEPGRAM_API_KEY`
    pub const DEEPGRAM_API_KEY: &str = "deepgram/api_key";
    /// OpenAI API key, `OPENAI_API_KEY`
    pub const OPENAI_API_KEY: &str = "openai/api_key";
}

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: [&str; 4] = [
    "speech.dispatch.synthesis_order",
    "speech.dispatch.live_order",
    "speech.dispatch.batch_order",
    "speech.dispatch.supported_languages",
];

/// Application environment (development or production)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Production environment
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Use 'development' or 'production'"
            )),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Voice dispatch configuration
    #[serde(default)]
    pub speech: SpeechDispatchConfig,
}

impl AppConfig {
    /// Load from `./config.toml` (if present) and the process environment
    pub fn load() -> Result<Self, InfrastructureError> {
        Self::from_sources(None, None)
    }

    /// Load from an explicit file, which must exist, and the process environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, InfrastructureError> {
        Self::from_sources(Some(path.as_ref()), None)
    }

    /// Load from an optional file and an environment map
    ///
    /// `env` replaces the process environment when given; keys use the
    /// same `CALLVOICE__…` form.
    pub fn from_sources(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, InfrastructureError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let environment = LIST_KEYS.iter().fold(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .try_parsing(true)
                .source(env),
            |source, key| source.with_list_parse_key(key),
        );

        let loaded: Self = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("logging.filter", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        info!(environment = %loaded.environment, "Configuration loaded");
        Ok(loaded)
    }

    /// Check the voice settings for consistency
    pub fn validate(&self) -> Result<(), InfrastructureError> {
        self.speech.validate().map_err(InfrastructureError::InvalidConfig)
    }

    /// Vendor sections present in the configuration but lacking credentials
    pub fn vendors_missing_credentials(&self) -> Vec<&'static str> {
        let providers = &self.speech.providers;
        let mut missing = Vec::new();
        if providers.elevenlabs.as_ref().is_some_and(|c| !c.is_configured()) {
            missing.push("elevenlabs");
        }
        if providers.azure.as_ref().is_some_and(|c| !c.is_configured()) {
            missing.push("azure");
        }
        if providers.deepgram.as_ref().is_some_and(|c| !c.is_configured()) {
            missing.push("deepgram");
        }
        if providers.openai.as_ref().is_some_and(|c| !c.is_configured()) {
            missing.push("openai");
        }
        missing
    }

    /// Fill vendor credentials from a secret store
    ///
    /// Credentials already present in the file or `CALLVOICE__` variables
    /// win. A credential found for a vendor without a section enables that
    /// vendor with default settings.
    pub async fn resolve_credentials(&mut self, store: &dyn SecretStore) -> Result<(), InfrastructureError> {
        let providers = &mut self.speech.providers;

        if let Some(key) = store.get_secret(secret_keys::ELEVENLABS_API_KEY).await? {
            let section = providers.elevenlabs.get_or_insert_with(ElevenLabsConfig::default);
            if !section.is_configured() {
                section.api_key = Some(SecretString::from(key));
                debug!(vendor = "elevenlabs", "Loaded API key from secret store");
            }
        }

        if let Some(key) = store.get_secret(secret_keys::AZURE_SPEECH_KEY).await? {
            let section = providers.azure.get_or_insert_with(AzureConfig::default);
            if !section.is_configured() {
                section.api_key = Some(SecretString::from(key));
                debug!(vendor = "azure", "Loaded API key from secret store");
            }
        }
        if let Some(section) = providers.azure.as_mut() {
            if let Some(region) = store.get_secret(secret_keys::AZURE_SPEECH_REGION).await? {
                debug!(vendor = "azure", region = %region, "Loaded region from secret store");
                section.region = region;
            }
        }

        if let Some(key) = store.get_secret(secret_keys::DEEPGRAM_API_KEY).await? {
            let section = providers.deepgram.get_or_insert_with(DeepgramConfig::default);
            if !section.is_configured() {
                section.api_key = Some(SecretString::from(key));
                debug!(vendor = "deepgram", "Loaded API key from secret store");
            }
        }

        if let Some(key) = store.get_secret(secret_keys::OPENAI_API_KEY).await? {
            let section = providers.openai.get_or_insert_with(OpenAiConfig::default);
            if !section.is_configured() {
                section.api_key = Some(SecretString::from(key));
                debug!(vendor = "openai", "Loaded API key from secret store");
            }
        }

        info!("Credential resolution completed");
        Ok(())
    }
}
