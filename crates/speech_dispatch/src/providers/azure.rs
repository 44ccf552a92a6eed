//! Azure Neural TTS adapter
//!
//! Requests are SSML documents; the preset speed becomes a prosody rate.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use super::{ensure_success, http_client};
use crate::config::AzureConfig;
use crate::error::{ProviderError, SpeechError};
use crate::ports::VoiceProvider;
use crate::presets::VoiceParams;
use crate::types::{AudioData, AudioFormat, Capability, CapabilitySet, ProviderId};

const USER_AGENT: &str = concat!("speech-dispatch/", env!("CARGO_PKG_VERSION"));

/// Azure synthesis
#[derive(Debug, Clone)]
pub struct AzureProvider {
    id: ProviderId,
    client: Client,
    config: AzureConfig,
    format: AudioFormat,
}

impl AzureProvider {
    /// Provider id used for registration and preset voice lookup
    pub const ID: &'static str = "azure";

    /// Create the adapter
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: AzureConfig) -> Result<Self, SpeechError> {
        Ok(Self {
            id: ProviderId::new(Self::ID),
            client: http_client(config.request_timeout_ms)?,
            format: output_format(&config.output_format),
            config,
        })
    }

    fn ssml(&self, text: &str, params: &VoiceParams) -> String {
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'>\
             <voice name='{voice}'><prosody rate='{rate}' pitch='0%'>{text}</prosody></voice></speak>",
            lang = escape_xml(&self.config.language),
            voice = escape_xml(&params.voice_id),
            rate = prosody_rate(params.speed),
            text = escape_xml(text),
        )
    }
}

/// Audio container announced by an Azure output format name
fn output_format(name: &str) -> AudioFormat {
    let name = name.to_ascii_lowercase();
    if name.ends_with("mp3") {
        AudioFormat::Mp3
    } else if name.starts_with("riff") {
        AudioFormat::Wav
    } else if name.starts_with("ogg") {
        AudioFormat::Ogg
    } else if name.starts_with("webm") {
        AudioFormat::Webm
    } else if name.starts_with("raw") {
        AudioFormat::Pcm
    } else {
        AudioFormat::Mp3
    }
}

fn prosody_rate(speed: f32) -> String {
    if (speed - 1.0).abs() < f32::EPSILON {
        "0%".to_string()
    } else {
        format!("{:+.0}%", (speed - 1.0) * 100.0)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl VoiceProvider for AzureProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::Synthesize])
    }

    #[instrument(skip(self, text, params), fields(voice = %params.voice_id, text_len = text.len()))]
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioData, ProviderError> {
        let key = self
            .config
            .api_key
            .as_ref()
            .map_or("", |key| key.expose_secret());

        let response = self
            .client
            .post(self.config.tts_url())
            .header("Ocp-Apim-Subscription-Key", key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .header("User-Agent", USER_AGENT)
            .body(self.ssml(text, params))
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;

        debug!(audio_size = bytes.len(), "Azure synthesis complete");
        Ok(AudioData::new(bytes, self.format))
    }
}
