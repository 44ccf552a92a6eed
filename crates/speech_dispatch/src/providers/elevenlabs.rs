//! ElevenLabs text-to-speech adapter

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{ensure_success, http_client};
use crate::config::ElevenLabsConfig;
use crate::error::{ProviderError, SpeechError};
use crate::ports::VoiceProvider;
use crate::presets::VoiceParams;
use crate::types::{AudioData, AudioFormat, Capability, CapabilitySet, ProviderId};

/// ElevenLabs synthesis
#[derive(Debug, Clone)]
pub struct ElevenLabsProvider {
    id: ProviderId,
    client: Client,
    config: ElevenLabsConfig,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl ElevenLabsProvider {
    /// Provider id used for registration and preset voice lookup
    pub const ID: &'static str = "elevenlabs";

    /// Create the adapter
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: ElevenLabsConfig) -> Result<Self, SpeechError> {
        Ok(Self {
            id: ProviderId::new(Self::ID),
            client: http_client(config.request_timeout_ms)?,
            config,
        })
    }

    fn url(&self, voice_id: &str) -> String {
        format!(
            "{}/text-to-speech/{voice_id}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> &str {
        self.config
            .api_key
            .as_ref()
            .map_or("", |key| key.expose_secret())
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::Synthesize])
    }

    #[instrument(skip(self, text, params), fields(voice = %params.voice_id, text_len = text.len()))]
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioData, ProviderError> {
        let body = TtsRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: params.stability,
                similarity_boost: params.similarity_boost,
                style: params.style,
                use_speaker_boost: self.config.use_speaker_boost,
            },
        };

        let response = self
            .client
            .post(self.url(&params.voice_id))
            .header("xi-api-key", self.api_key())
            .header("Accept", AudioFormat::Mp3.mime_type())
            .json(&body)
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;

        debug!(audio_size = bytes.len(), "ElevenLabs synthesis complete");
        Ok(AudioData::new(bytes, AudioFormat::Mp3))
    }
}
