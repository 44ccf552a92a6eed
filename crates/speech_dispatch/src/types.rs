//! Types for voice dispatch
//!
//! Contains audio payloads, provider identity and capabilities, and the
//! request/result shapes exchanged with callers.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Opus codec
    Opus,
    /// OGG container (typically with Opus codec)
    Ogg,
    /// MP3 format
    Mp3,
    /// WAV format (uncompressed)
    Wav,
    /// FLAC format (lossless)
    Flac,
    /// WebM format
    Webm,
    /// M4A/AAC format
    M4a,
    /// Raw 16-bit little-endian PCM, as carried by telephony media streams
    Pcm,
}

impl AudioFormat {
    /// Get the MIME type for this audio format
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Opus => "audio/opus",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::Webm => "audio/webm",
            Self::M4a => "audio/m4a",
            Self::Pcm => "audio/l16",
        }
    }

    /// Get the file extension for this audio format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Webm => "webm",
            Self::M4a => "m4a",
            Self::Pcm => "pcm",
        }
    }

    /// Guess the format from a file extension (case-insensitive)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "opus" => Some(Self::Opus),
            "ogg" | "oga" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "webm" => Some(Self::Webm),
            "m4a" | "mp4" | "aac" => Some(Self::M4a),
            "pcm" | "raw" => Some(Self::Pcm),
            _ => None,
        }
    }
}

/// Container for a complete audio buffer with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    /// Raw audio bytes
    data: Bytes,
    /// Audio format
    format: AudioFormat,
    /// Duration in milliseconds (if known)
    duration_ms: Option<u64>,
    /// Sample rate in Hz (if known)
    sample_rate: Option<u32>,
}

impl AudioData {
    /// Create new audio data
    #[must_use]
    pub fn new(data: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            data: data.into(),
            format,
            duration_ms: None,
            sample_rate: None,
        }
    }

    /// Create audio data with duration
    #[must_use]
    pub const fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Create audio data with sample rate
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Get the raw audio bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a cheap handle to the underlying buffer
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Consume and return the raw audio bytes
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Get the audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the duration in milliseconds (if known)
    #[must_use]
    pub const fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Get the sample rate (if known)
    #[must_use]
    pub const fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Get the size of the audio data in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the audio data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the MIME type for this audio
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Generate a filename with appropriate extension
    #[must_use]
    pub fn filename(&self, base: &str) -> String {
        format!("{}.{}", base, self.format.extension())
    }
}

/// Boxed stream of audio chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Incremental audio, e.g. the inbound leg of a live call
///
/// The stream ends when the caller stops sending audio.
pub struct AudioStream {
    format: AudioFormat,
    sample_rate: Option<u32>,
    chunks: ChunkStream,
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl AudioStream {
    /// Wrap an arbitrary chunk stream
    pub fn new(format: AudioFormat, chunks: impl Stream<Item = Bytes> + Send + 'static) -> Self {
        Self {
            format,
            sample_rate: None,
            chunks: Box::pin(chunks),
        }
    }

    /// Build a finite stream from already-buffered chunks
    #[must_use]
    pub fn from_chunks(format: AudioFormat, chunks: Vec<Bytes>) -> Self {
        Self::new(format, futures::stream::iter(chunks))
    }

    /// Set the sample rate
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Get the audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the sample rate (if known)
    #[must_use]
    pub const fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Split into metadata and the chunk stream
    #[must_use]
    pub fn into_parts(self) -> (AudioFormat, Option<u32>, ChunkStream) {
        (self.format, self.sample_rate, self.chunks)
    }
}

/// Audio handed to the transcription dispatcher
#[derive(Debug)]
pub enum AudioInput {
    /// A complete recording
    Buffer(AudioData),
    /// Audio arriving incrementally
    Stream(AudioStream),
}

impl From<AudioData> for AudioInput {
    fn from(audio: AudioData) -> Self {
        Self::Buffer(audio)
    }
}

impl From<AudioStream> for AudioInput {
    fn from(stream: AudioStream) -> Self {
        Self::Stream(stream)
    }
}

/// Identifier of a registered provider (e.g. "elevenlabs")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for ProviderId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProviderId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A unit of work a provider can perform
///
/// Live and batch transcription are separate capabilities so that a
/// request in one mode can never be served from the other mode's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text to speech
    Synthesize,
    /// Low-latency streaming speech to text
    TranscribeLive,
    /// Accurate speech to text over a complete recording
    TranscribeBatch,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Self; 3] = [Self::Synthesize, Self::TranscribeLive, Self::TranscribeBatch];

    const fn bit(self) -> u8 {
        match self {
            Self::Synthesize => 0b001,
            Self::TranscribeLive => 0b010,
            Self::TranscribeBatch => 0b100,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synthesize => write!(f, "synthesize"),
            Self::TranscribeLive => write!(f, "transcribe_live"),
            Self::TranscribeBatch => write!(f, "transcribe_batch"),
        }
    }
}

/// Set of capabilities a provider declares
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of capabilities
    #[must_use]
    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::empty(), |set, cap| set.with(*cap))
    }

    /// Add a capability
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Check membership
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Check whether no capability is declared
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over contained capabilities
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |cap| self.contains(*cap))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Transcription mode declared by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionMode {
    /// In-call, streaming, latency first
    Live,
    /// Post-call, accuracy first
    Batch,
}

impl TranscriptionMode {
    /// Capability a provider needs to serve this mode
    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::Live => Capability::TranscribeLive,
            Self::Batch => Capability::TranscribeBatch,
        }
    }
}

impl fmt::Display for TranscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Optional emotion sliders overriding a voice preset
///
/// All sliders except `speed` are in `0.0..=1.0`; `speed` is a playback
/// multiplier in `0.25..=4.0`. Requests carry sliders rounded to
/// hundredths, the same resolution phrase caching keys on.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionParams {
    /// Voice stability (low = more expressive)
    #[serde(default)]
    pub stability: Option<f32>,
    /// Adherence to the reference voice
    #[serde(default)]
    pub similarity_boost: Option<f32>,
    /// Style exaggeration
    #[serde(default)]
    pub style: Option<f32>,
    /// Speaking rate multiplier
    #[serde(default)]
    pub speed: Option<f32>,
}

impl EmotionParams {
    /// Round every slider to hundredths
    #[must_use]
    pub fn quantized(self) -> Self {
        let round = |v: Option<f32>| v.map(|v| (v * 100.0).round() / 100.0);
        Self {
            stability: round(self.stability),
            similarity_boost: round(self.similarity_boost),
            style: round(self.style),
            speed: round(self.speed),
        }
    }

    /// Set stability
    #[must_use]
    pub const fn with_stability(mut self, value: f32) -> Self {
        self.stability = Some(value);
        self
    }

    /// Set similarity boost
    #[must_use]
    pub const fn with_similarity_boost(mut self, value: f32) -> Self {
        self.similarity_boost = Some(value);
        self
    }

    /// Set style
    #[must_use]
    pub const fn with_style(mut self, value: f32) -> Self {
        self.style = Some(value);
        self
    }

    /// Set speed
    #[must_use]
    pub const fn with_speed(mut self, value: f32) -> Self {
        self.speed = Some(value);
        self
    }

    /// Check slider ranges
    pub fn validate(&self) -> Result<(), String> {
        let unit = [
            ("stability", self.stability),
            ("similarity_boost", self.similarity_boost),
            ("style", self.style),
        ];
        for (name, value) in unit {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!("{name} must be between 0.0 and 1.0, got {v}"));
                }
            }
        }
        if let Some(speed) = self.speed {
            if !(0.25..=4.0).contains(&speed) {
                return Err(format!("speed must be between 0.25 and 4.0, got {speed}"));
            }
        }
        Ok(())
    }
}

/// A request to speak a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    voice_profile: String,
    emotion: Option<EmotionParams>,
    provider_override: Option<ProviderId>,
}

impl SynthesisRequest {
    /// Create a request for `text` spoken in the given voice profile
    #[must_use]
    pub fn new(text: impl Into<String>, voice_profile: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_profile: voice_profile.into(),
            emotion: None,
            provider_override: None,
        }
    }

    /// Attach emotion sliders
    #[must_use]
    ///
    /// Sliders are rounded with [`EmotionParams::quantized`], so requests
    /// that share a cache entry also share the voice settings sent out.
    pub fn with_emotion(mut self, emotion: EmotionParams) -> Self {
        self.emotion = Some(emotion.quantized());
        self
    }

    /// Try this provider before the configured order
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    /// Text to speak
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Semantic voice profile
    #[must_use]
    pub fn voice_profile(&self) -> &str {
        &self.voice_profile
    }

    /// Emotion sliders, if any
    #[must_use]
    pub const fn emotion(&self) -> Option<&EmotionParams> {
        self.emotion.as_ref()
    }

    /// Provider override, if any
    #[must_use]
    pub const fn provider_override(&self) -> Option<&ProviderId> {
        self.provider_override.as_ref()
    }
}

/// Audio produced for a synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResult {
    /// Synthesized audio
    pub audio: AudioData,
    /// Provider that produced the audio (or originally produced the cached copy)
    pub provider_used: ProviderId,
    /// Duration of the winning provider attempt, zero for cache hits
    pub latency_ms: u64,
    /// Whether the audio came from the phrase cache
    pub cache_hit: bool,
}

/// A request to transcribe audio
#[derive(Debug)]
pub struct TranscriptionRequest {
    audio: AudioInput,
    mode: TranscriptionMode,
    language: Option<String>,
    provider_override: Option<ProviderId>,
}

impl TranscriptionRequest {
    /// Create a request with an explicit mode
    #[must_use]
    pub fn new(audio: impl Into<AudioInput>, mode: TranscriptionMode) -> Self {
        Self {
            audio: audio.into(),
            mode,
            language: None,
            provider_override: None,
        }
    }

    /// Post-call transcription of a complete recording
    #[must_use]
    pub fn batch(audio: AudioData) -> Self {
        Self::new(audio, TranscriptionMode::Batch)
    }

    /// In-call transcription of a live audio stream
    #[must_use]
    pub fn live(stream: AudioStream) -> Self {
        Self::new(stream, TranscriptionMode::Live)
    }

    /// Set the language hint (BCP-47 tag such as "en" or "en-US")
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Try this provider before the configured order
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    /// Declared mode
    #[must_use]
    pub const fn mode(&self) -> TranscriptionMode {
        self.mode
    }

    /// Language hint, if any
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Provider override, if any
    #[must_use]
    pub const fn provider_override(&self) -> Option<&ProviderId> {
        self.provider_override.as_ref()
    }

    /// Audio payload
    #[must_use]
    pub const fn audio(&self) -> &AudioInput {
        &self.audio
    }

    /// Consume the request
    #[must_use]
    pub fn into_audio(self) -> AudioInput {
        self.audio
    }
}

/// Timing of a single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    /// The word
    pub word: String,
    /// Start offset in milliseconds
    pub start_ms: u64,
    /// End offset in milliseconds
    pub end_ms: u64,
    /// Recognition confidence (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl WordSpan {
    /// Create a word span from second offsets as reported by most vendors
    #[must_use]
    pub fn from_seconds(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start_ms: seconds_to_ms(start),
            end_ms: seconds_to_ms(end),
            confidence: None,
        }
    }

    /// Attach a confidence score
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Transcript as returned by a single provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Transcribed text
    pub text: String,
    /// Overall confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Word spans, in order
    #[serde(default)]
    pub words: Vec<WordSpan>,
    /// Detected or hinted language
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcription {
    /// Create a transcription with full confidence and no word timings
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 1.0,
            words: Vec::new(),
            language: None,
        }
    }

    /// Set the overall confidence, clamped to `0.0..=1.0`
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set word spans
    #[must_use]
    pub fn with_words(mut self, words: Vec<WordSpan>) -> Self {
        self.words = words;
        self
    }

    /// Set the language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Transcript returned to callers, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Transcribed text
    pub text: String,
    /// Overall confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Word spans, in order
    pub words: Vec<WordSpan>,
    /// Provider that produced the transcript
    pub provider_used: ProviderId,
    /// Language of the transcript
    pub language: String,
    /// Duration of the winning provider attempt
    pub latency_ms: u64,
}

impl TranscriptionResult {
    /// Attach provenance to a provider transcript
    #[must_use]
    pub fn from_transcription(
        transcription: Transcription,
        provider_used: ProviderId,
        requested_language: &str,
        latency_ms: u64,
    ) -> Self {
        Self {
            text: transcription.text,
            confidence: transcription.confidence.clamp(0.0, 1.0),
            words: transcription.words,
            provider_used,
            language: transcription
                .language
                .unwrap_or_else(|| requested_language.to_string()),
            latency_ms,
        }
    }
}

/// Event delivered on a live transcript stream
///
/// A stream yields any number of `Partial` events followed by exactly one
/// `Final` event, or ends with an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Interim hypothesis; may be revised by later events
    Partial {
        /// Text recognized so far in the current segment
        text: String,
        /// Word spans recognized so far in the current segment
        words: Vec<WordSpan>,
    },
    /// Completed transcript
    Final(TranscriptionResult),
}
