//! OpenAI speech adapter
//!
//! Batch transcription uses Whisper with `verbose_json` output so word
//! timestamps and segment log-probabilities come back with the text.
//! Synthesis uses the TTS endpoint and always requests MP3.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::http_client;
use crate::config::OpenAiConfig;
use crate::error::{ProviderError, SpeechError};
use crate::ports::VoiceProvider;
use crate::presets::VoiceParams;
use crate::types::{AudioData, AudioFormat, Capability, CapabilitySet, ProviderId, Transcription, WordSpan};

/// Confidence reported when Whisper returns no segment statistics
const DEFAULT_CONFIDENCE: f32 = 0.95;

/// OpenAI Whisper transcription and TTS synthesis
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    id: ProviderId,
    client: Client,
    config: OpenAiConfig,
}

/// Whisper `verbose_json` response
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    words: Vec<WhisperWord>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    avg_logprob: Option<f64>,
    #[serde(default)]
    words: Vec<WhisperWord>,
}

impl WhisperResponse {
    fn word_spans(&mut self) -> Vec<WordSpan> {
        let words = if self.words.is_empty() {
            self.segments
                .iter_mut()
                .flat_map(|s| std::mem::take(&mut s.words))
                .collect()
        } else {
            std::mem::take(&mut self.words)
        };
        words
            .into_iter()
            .map(|w| WordSpan::from_seconds(w.word.trim(), w.start, w.end))
            .collect()
    }

    /// Mean segment log-probability mapped back to a probability
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn confidence(&self) -> f32 {
        let logprobs: Vec<f64> = self.segments.iter().filter_map(|s| s.avg_logprob).collect();
        if logprobs.is_empty() {
            return DEFAULT_CONFIDENCE;
        }
        let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
        mean.exp().clamp(0.0, 1.0) as f32
    }
}

/// OpenAI TTS request body
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<String>,
}

impl OpenAiProvider {
    /// Provider id used for registration and preset voice lookup
    pub const ID: &'static str = "openai";

    /// Create the adapter
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, SpeechError> {
        Ok(Self {
            id: ProviderId::new(Self::ID),
            client: http_client(config.request_timeout_ms)?,
            config,
        })
    }

    fn api_key(&self) -> &str {
        self.config
            .api_key
            .as_ref()
            .map_or("", |key| key.expose_secret())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Classify a failed response, preferring the structured error code
    async fn failure(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            match api_error.error.code.as_deref() {
                Some("rate_limit_exceeded" | "insufficient_quota") => {
                    return ProviderError::RateLimited(api_error.error.message);
                },
                Some("invalid_api_key") => return ProviderError::Auth(api_error.error.message),
                _ => {},
            }
        }
        ProviderError::from_status(status, &body)
    }
}

#[async_trait]
impl VoiceProvider for OpenAiProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::empty();
        if self.config.synthesis {
            caps = caps.with(Capability::Synthesize);
        }
        if self.config.transcription {
            caps = caps.with(Capability::TranscribeBatch);
        }
        caps
    }

    #[instrument(skip(self, text, params), fields(voice = %params.voice_id, text_len = text.len()))]
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioData, ProviderError> {
        let request = TtsRequest {
            model: &self.config.tts_model,
            input: text,
            voice: &params.voice_id,
            response_format: "mp3",
            speed: if (params.speed - 1.0).abs() < f32::EPSILON {
                None
            } else {
                Some(params.speed.clamp(0.25, 4.0))
            },
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(self.api_key())
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let bytes = response.bytes().await?;
        debug!(audio_size = bytes.len(), "OpenAI synthesis complete");
        Ok(AudioData::new(bytes, AudioFormat::Mp3))
    }

    #[instrument(skip(self, audio), fields(audio_size = audio.size_bytes(), format = ?audio.format()))]
    async fn transcribe(&self, audio: AudioData, language: &str) -> Result<Transcription, ProviderError> {
        let filename = audio.filename("audio");
        let mime_type = audio.mime_type();
        let file_part = Part::bytes(audio.into_bytes().to_vec())
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| ProviderError::Unavailable(format!("Invalid MIME type: {e}")))?;

        // Whisper expects ISO-639-1, so region subtags are dropped
        let primary = language.split('-').next().unwrap_or(language);
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.config.stt_model.clone())
            .text("language", primary.to_ascii_lowercase())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word");

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(self.api_key())
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let mut body: WhisperResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to parse response: {e}")))?;

        let words = body.word_spans();
        let confidence = body.confidence();
        debug!(
            text_len = body.text.len(),
            words = words.len(),
            language = ?body.language,
            "Whisper transcription complete"
        );

        let transcription = Transcription::new(body.text.trim())
            .with_confidence(confidence)
            .with_words(words);
        Ok(match body.language {
            Some(lang) => transcription.with_language(lang),
            None => transcription,
        })
    }
}
