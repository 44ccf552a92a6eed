//! Configuration for voice dispatch
//!
//! Every field has a serde default so an empty `[speech]` table yields a
//! working configuration. Vendor credentials are never serialized and are
//! redacted from `Debug` output.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::presets::{PresetDefinition, PresetTable};
use crate::types::{Capability, ProviderId};

const fn default_true() -> bool {
    true
}

fn redacted(secret: Option<&SecretString>) -> Option<&'static str> {
    secret.map(|_| "[REDACTED]")
}

/// Top-level voice dispatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechDispatchConfig {
    /// Provider ordering, deadlines and input limits
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Circuit breaker tuning
    #[serde(default)]
    pub health: HealthConfig,

    /// Phrase cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Degraded-mode behavior
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Vendor sections
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Voice presets; empty means the built-in table
    #[serde(default)]
    pub presets: BTreeMap<String, PresetDefinition>,
}

impl SpeechDispatchConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        self.dispatch.validate()?;
        self.health.validate()?;
        self.cache.validate()?;
        self.fallback.validate()?;
        Ok(())
    }

    /// Build the preset table this configuration describes
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` for invalid preset definitions.
    pub fn preset_table(&self) -> Result<PresetTable, SpeechError> {
        if self.presets.is_empty() {
            Ok(PresetTable::builtin())
        } else {
            PresetTable::from_definitions(self.presets.clone())
        }
    }
}

/// Provider ordering, deadlines and input limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Fallback order for synthesis (empty = registration order)
    #[serde(default)]
    pub synthesis_order: Vec<ProviderId>,

    /// Fallback order for live transcription (empty = registration order)
    #[serde(default)]
    pub live_order: Vec<ProviderId>,

    /// Fallback order for batch transcription (empty = registration order)
    #[serde(default)]
    pub batch_order: Vec<ProviderId>,

    /// Per-attempt deadline for synthesis and live session setup
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Per-attempt deadline for batch transcription
    #[serde(default = "default_batch_attempt_timeout_ms")]
    pub batch_attempt_timeout_ms: u64,

    /// Longest gap between live transcript events before the session is failed
    #[serde(default = "default_live_idle_timeout_ms")]
    pub live_idle_timeout_ms: u64,

    /// Total wall-clock budget per request (default: attempt deadline x chain length)
    #[serde(default)]
    pub max_total_ms: Option<u64>,

    /// Maximum text length in characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Maximum audio payload in bytes
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,

    /// Live audio kept for replay to a fallback provider before the first result
    #[serde(default = "default_max_replay_bytes")]
    pub max_replay_bytes: usize,

    /// Language used when a request carries no hint
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Accepted language tags (empty = any well-formed tag)
    #[serde(default)]
    pub supported_languages: Vec<String>,

    /// Capabilities that must be served, checked at startup
    #[serde(default = "default_required_capabilities")]
    pub required_capabilities: Vec<Capability>,
}

const fn default_attempt_timeout_ms() -> u64 {
    1200
}

const fn default_batch_attempt_timeout_ms() -> u64 {
    30_000
}

const fn default_live_idle_timeout_ms() -> u64 {
    10_000
}

const fn default_max_text_chars() -> usize {
    4096
}

const fn default_max_audio_bytes() -> usize {
    25 * 1024 * 1024
}

const fn default_max_replay_bytes() -> usize {
    1024 * 1024
}

fn default_language() -> String {
    "en".to_string()
}

fn default_required_capabilities() -> Vec<Capability> {
    vec![Capability::Synthesize, Capability::TranscribeBatch]
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            synthesis_order: Vec::new(),
            live_order: Vec::new(),
            batch_order: Vec::new(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            batch_attempt_timeout_ms: default_batch_attempt_timeout_ms(),
            live_idle_timeout_ms: default_live_idle_timeout_ms(),
            max_total_ms: None,
            max_text_chars: default_max_text_chars(),
            max_audio_bytes: default_max_audio_bytes(),
            max_replay_bytes: default_max_replay_bytes(),
            default_language: default_language(),
            supported_languages: Vec::new(),
            required_capabilities: default_required_capabilities(),
        }
    }
}

impl DispatchConfig {
    /// Configured order for a capability
    #[must_use]
    pub fn order_for(&self, capability: Capability) -> &[ProviderId] {
        match capability {
            Capability::Synthesize => &self.synthesis_order,
            Capability::TranscribeLive => &self.live_order,
            Capability::TranscribeBatch => &self.batch_order,
        }
    }

    /// Deadline for one provider attempt
    #[must_use]
    pub const fn attempt_timeout(&self, capability: Capability) -> Duration {
        match capability {
            Capability::Synthesize | Capability::TranscribeLive => {
                Duration::from_millis(self.attempt_timeout_ms)
            },
            Capability::TranscribeBatch => Duration::from_millis(self.batch_attempt_timeout_ms),
        }
    }

    /// Total budget for a request that may try `chain_len` providers
    #[must_use]
    pub fn total_budget(&self, capability: Capability, chain_len: usize) -> Duration {
        self.max_total_ms.map_or_else(
            || {
                let len = u32::try_from(chain_len.max(1)).unwrap_or(u32::MAX);
                self.attempt_timeout(capability).saturating_mul(len)
            },
            Duration::from_millis,
        )
    }

    /// Idle limit between live events
    #[must_use]
    pub const fn live_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.live_idle_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.attempt_timeout_ms == 0 || self.batch_attempt_timeout_ms == 0 {
            return Err("attempt timeouts must be greater than 0".to_string());
        }
        if self.live_idle_timeout_ms == 0 {
            return Err("live_idle_timeout_ms must be greater than 0".to_string());
        }
        if self.max_total_ms == Some(0) {
            return Err("max_total_ms must be greater than 0".to_string());
        }
        if self.max_text_chars == 0 {
            return Err("max_text_chars must be greater than 0".to_string());
        }
        if self.max_audio_bytes == 0 {
            return Err("max_audio_bytes must be greater than 0".to_string());
        }
        if !is_language_tag(&self.default_language) {
            return Err(format!("default_language '{}' is not a language tag", self.default_language));
        }
        if let Some(bad) = self.supported_languages.iter().find(|l| !is_language_tag(l)) {
            return Err(format!("supported_languages entry '{bad}' is not a language tag"));
        }
        Ok(())
    }
}

/// Loose BCP-47 shape check: a 2-3 letter primary subtag followed by
/// alphanumeric subtags of up to 8 characters
#[must_use]
pub fn is_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    primary_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Circuit breaker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures that open a circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time an open circuit waits before allowing a trial call
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_cooldown_ms() -> u64 {
    30_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl HealthConfig {
    /// Cool-down as a duration
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Phrase cache tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether synthesized phrases are cached
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Capacity in megabytes of audio
    #[serde(default = "default_max_capacity_mb")]
    pub max_capacity_mb: u64,

    /// Time to live in seconds (None = until evicted)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: Option<u64>,
}

const fn default_max_capacity_mb() -> u64 {
    64
}

#[allow(clippy::unnecessary_wraps)]
const fn default_ttl_secs() -> Option<u64> {
    Some(86_400)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity_mb: default_max_capacity_mb(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.max_capacity_mb == 0 {
            return Err("cache max_capacity_mb must be greater than 0".to_string());
        }
        if self.ttl_secs == Some(0) {
            return Err("cache ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Degraded-mode behavior of the caller-facing path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Phrase played when synthesis fails completely
    #[serde(default = "default_apology_text")]
    pub apology_text: String,

    /// Voice profile for the apology
    #[serde(default = "default_apology_profile")]
    pub apology_profile: String,

    /// Phrases synthesized at startup so calls hit the cache
    #[serde(default = "default_prewarm_phrases")]
    pub prewarm_phrases: Vec<String>,

    /// Voice profile for prewarmed phrases
    #[serde(default = "default_prewarm_profile")]
    pub prewarm_profile: String,
}

fn default_apology_text() -> String {
    "I'm sorry, I'm having a little trouble right now. Please bear with me for a moment."
        .to_string()
}

fn default_apology_profile() -> String {
    "empathetic".to_string()
}

fn default_prewarm_phrases() -> Vec<String> {
    vec![
        "Hey there, thanks for calling! How can I help you today?".to_string(),
        "Sure, give me just a moment.".to_string(),
        "Thanks for calling! Have a great day.".to_string(),
    ]
}

fn default_prewarm_profile() -> String {
    "warm".to_string()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            apology_text: default_apology_text(),
            apology_profile: default_apology_profile(),
            prewarm_phrases: default_prewarm_phrases(),
            prewarm_profile: default_prewarm_profile(),
        }
    }
}

impl FallbackConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.apology_text.trim().is_empty() {
            return Err("apology_text must not be empty".to_string());
        }
        Ok(())
    }
}

/// Vendor sections; a vendor without a section or credentials is not registered
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// ElevenLabs text to speech
    #[serde(default)]
    pub elevenlabs: Option<ElevenLabsConfig>,

    /// Azure Neural TTS
    #[serde(default)]
    pub azure: Option<AzureConfig>,

    /// Deepgram speech to text
    #[serde(default)]
    pub deepgram: Option<DeepgramConfig>,

    /// OpenAI Whisper and TTS
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
}

/// ElevenLabs configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    /// API key (sensitive)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// API base URL
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,

    /// Synthesis model
    #[serde(default = "default_elevenlabs_model")]
    pub model_id: String,

    /// Enable the vendor's speaker boost
    #[serde(default = "default_true")]
    pub use_speaker_boost: bool,

    /// Transport timeout backstop in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_elevenlabs_model() -> String {
    "eleven_turbo_v2".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_elevenlabs_base_url(),
            model_id: default_elevenlabs_model(),
            use_speaker_boost: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("use_speaker_boost", &self.use_speaker_boost)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ElevenLabsConfig {
    /// Whether credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref())
    }
}

/// Azure Neural TTS configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Subscription key (sensitive)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Azure region, e.g. "eastus"
    #[serde(default = "default_azure_region")]
    pub region: String,

    /// Endpoint override (defaults to the regional TTS endpoint)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Value of the output format header
    #[serde(default = "default_azure_output_format")]
    pub output_format: String,

    /// `xml:lang` of generated SSML
    #[serde(default = "default_azure_language")]
    pub language: String,

    /// Transport timeout backstop in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_azure_region() -> String {
    "eastus".to_string()
}

fn default_azure_output_format() -> String {
    "audio-16khz-128kbitrate-mono-mp3".to_string()
}

fn default_azure_language() -> String {
    "en-US".to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: default_azure_region(),
            endpoint: None,
            output_format: default_azure_output_format(),
            language: default_azure_language(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("output_format", &self.output_format)
            .field("language", &self.language)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl AzureConfig {
    /// Whether credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref()) && !self.region.trim().is_empty()
    }

    /// Synthesis endpoint
    #[must_use]
    pub fn tts_url(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            )
        })
    }
}

/// Deepgram configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DeepgramConfig {
    /// API key (sensitive)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// REST base URL
    #[serde(default = "default_deepgram_base_url")]
    pub base_url: String,

    /// Streaming WebSocket URL
    #[serde(default = "default_deepgram_streaming_url")]
    pub streaming_url: String,

    /// Recognition model
    #[serde(default = "default_deepgram_model")]
    pub model: String,

    /// Encoding announced for raw PCM streams
    #[serde(default = "default_deepgram_encoding")]
    pub encoding: String,

    /// Sample rate announced when the stream does not carry one
    #[serde(default = "default_deepgram_sample_rate")]
    pub sample_rate: u32,

    /// Ask for interim (partial) results on live streams
    #[serde(default = "default_true")]
    pub interim_results: bool,

    /// Transport timeout backstop in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_deepgram_base_url() -> String {
    "https://api.deepgram.com/v1".to_string()
}

fn default_deepgram_streaming_url() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_deepgram_model() -> String {
    "nova-2".to_string()
}

fn default_deepgram_encoding() -> String {
    "linear16".to_string()
}

const fn default_deepgram_sample_rate() -> u32 {
    16_000
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_deepgram_base_url(),
            streaming_url: default_deepgram_streaming_url(),
            model: default_deepgram_model(),
            encoding: default_deepgram_encoding(),
            sample_rate: default_deepgram_sample_rate(),
            interim_results: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl fmt::Debug for DeepgramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepgramConfig")
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("base_url", &self.base_url)
            .field("streaming_url", &self.streaming_url)
            .field("model", &self.model)
            .field("encoding", &self.encoding)
            .field("sample_rate", &self.sample_rate)
            .field("interim_results", &self.interim_results)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl DeepgramConfig {
    /// Whether credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref())
    }
}

/// OpenAI configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (sensitive)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// API base URL
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Speech-to-text model
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Text-to-speech model
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Offer batch transcription
    #[serde(default = "default_true")]
    pub transcription: bool,

    /// Offer synthesis
    #[serde(default = "default_true")]
    pub synthesis: bool,

    /// Transport timeout backstop in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            transcription: true,
            synthesis: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("base_url", &self.base_url)
            .field("stt_model", &self.stt_model)
            .field("tts_model", &self.tts_model)
            .field("transcription", &self.transcription)
            .field("synthesis", &self.synthesis)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl OpenAiConfig {
    /// Whether credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref())
    }
}

fn has_secret(secret: Option<&SecretString>) -> bool {
    secret.is_some_and(|s| !s.expose_secret().trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SpeechDispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.attempt_timeout_ms, 1200);
        assert_eq!(config.dispatch.max_audio_bytes, 25 * 1024 * 1024);
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.health.cooldown(), Duration::from_secs(30));
        assert!(config.cache.enabled);
    }

    #[test]
    fn total_budget_defaults_to_attempt_times_chain() {
        let config = DispatchConfig::default();
        assert_eq!(
            config.total_budget(Capability::Synthesize, 3),
            Duration::from_millis(3600)
        );
        assert_eq!(
            config.total_budget(Capability::Synthesize, 0),
            Duration::from_millis(1200)
        );
        assert_eq!(
            config.total_budget(Capability::TranscribeBatch, 2),
            Duration::from_secs(60)
        );

        let capped = DispatchConfig {
            max_total_ms: Some(2000),
            ..Default::default()
        };
        assert_eq!(
            capped.total_budget(Capability::Synthesize, 5),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn zero_threshold_rejected() {
        let health = HealthConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(health.validate().is_err());
    }

    #[test]
    fn language_tags() {
        assert!(is_language_tag("en"));
        assert!(is_language_tag("en-US"));
        assert!(is_language_tag("zh-Hant-TW"));
        assert!(!is_language_tag(""));
        assert!(!is_language_tag("english!"));
        assert!(!is_language_tag("e"));
        assert!(!is_language_tag("en-"));
    }

    #[test]
    fn bad_supported_language_rejected() {
        let config = DispatchConfig {
            supported_languages: vec!["en".into(), "??".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserialize_from_toml() {
        let toml_str = r#"
            [dispatch]
            synthesis_order = ["azure", "elevenlabs"]
            attempt_timeout_ms = 800
            required_capabilities = ["synthesize", "transcribe_live"]

            [health]
            failure_threshold = 5

            [cache]
            ttl_secs = 600

            [providers.azure]
            api_key = "azure-secret"
            region = "westeurope"

            [presets.calm]
            stability = 0.8
            voices = { azure = "en-GB-RyanNeural" }
        "#;

        let config: SpeechDispatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.dispatch.synthesis_order,
            vec![ProviderId::new("azure"), ProviderId::new("elevenlabs")]
        );
        assert_eq!(config.dispatch.attempt_timeout_ms, 800);
        assert_eq!(
            config.dispatch.required_capabilities,
            vec![Capability::Synthesize, Capability::TranscribeLive]
        );
        assert_eq!(config.health.failure_threshold, 5);
        assert_eq!(config.health.cooldown_ms, 30_000);
        assert_eq!(config.cache.ttl_secs, Some(600));

        let azure = config.providers.azure.as_ref().unwrap();
        assert!(azure.is_configured());
        assert_eq!(
            azure.tts_url(),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert!(config.providers.elevenlabs.is_none());

        let presets = config.preset_table().unwrap();
        assert_eq!(presets.names().collect::<Vec<_>>(), vec!["calm"]);
    }

    #[test]
    fn secrets_are_redacted_and_not_serialized() {
        let config = DeepgramConfig {
            api_key: Some(SecretString::from("dg-secret")),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("dg-secret"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("dg-secret"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn blank_secret_is_not_configured() {
        let config = OpenAiConfig {
            api_key: Some(SecretString::from("  ")),
            ..Default::default()
        };
        assert!(!config.is_configured());
        assert!(!OpenAiConfig::default().is_configured());
    }
}
