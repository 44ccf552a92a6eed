//! Vendor adapters
//!
//! Each adapter implements [`VoiceProvider`] for one vendor and maps vendor
//! failures onto [`ProviderError`]. Adapters know nothing about fallback,
//! caching or circuit state.

pub mod azure;
pub mod deepgram;
pub mod elevenlabs;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{info, warn};

pub use azure::AzureProvider;
pub use deepgram::DeepgramProvider;
pub use elevenlabs::ElevenLabsProvider;
pub use openai::OpenAiProvider;

use crate::config::ProvidersConfig;
use crate::error::{ProviderError, SpeechError};
use crate::ports::VoiceProvider;

/// Builds adapters for every configured vendor
#[derive(Debug, Clone, Copy)]
pub struct ProviderCatalog;

impl ProviderCatalog {
    /// Instantiate adapters for the vendors that have credentials
    ///
    /// Vendors without credentials are left out with a warning. The result
    /// is in registration order: ElevenLabs, Azure, Deepgram, OpenAI.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if an HTTP client cannot be built.
    pub fn from_config(config: &ProvidersConfig) -> Result<Vec<Arc<dyn VoiceProvider>>, SpeechError> {
        let mut adapters: Vec<Arc<dyn VoiceProvider>> = Vec::new();

        match &config.elevenlabs {
            Some(cfg) if cfg.is_configured() => {
                adapters.push(Arc::new(ElevenLabsProvider::new(cfg.clone())?));
            },
            Some(_) => warn!(provider = "elevenlabs", "No API key configured, provider disabled"),
            None => {},
        }
        match &config.azure {
            Some(cfg) if cfg.is_configured() => {
                adapters.push(Arc::new(AzureProvider::new(cfg.clone())?));
            },
            Some(_) => warn!(provider = "azure", "No subscription key configured, provider disabled"),
            None => {},
        }
        match &config.deepgram {
            Some(cfg) if cfg.is_configured() => {
                adapters.push(Arc::new(DeepgramProvider::new(cfg.clone())?));
            },
            Some(_) => warn!(provider = "deepgram", "No API key configured, provider disabled"),
            None => {},
        }
        match &config.openai {
            Some(cfg) if cfg.is_configured() => {
                let provider = OpenAiProvider::new(cfg.clone())?;
                if provider.capabilities().is_empty() {
                    warn!(provider = "openai", "Both synthesis and transcription disabled, provider skipped");
                } else {
                    adapters.push(Arc::new(provider));
                }
            },
            Some(_) => warn!(provider = "openai", "No API key configured, provider disabled"),
            None => {},
        }

        info!(count = adapters.len(), "Voice provider adapters created");
        Ok(adapters)
    }
}

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client, SpeechError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| SpeechError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Pass a successful response through, classify anything else
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status.as_u16(), &body))
}
