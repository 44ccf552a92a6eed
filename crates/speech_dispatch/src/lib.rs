//! Speech Dispatch - voice synthesis and transcription for live calls
//!
//! Routes text-to-speech and speech-to-text requests across interchangeable
//! vendor providers:
//! - `SynthesisDispatcher` - phrase cache first, then providers in fallback order
//! - `TranscriptionDispatcher` - separate pools for LIVE and BATCH audio
//! - `VoiceService` - shared state plus a never-failing facade for the call path
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` defines the `VoiceProvider` trait (port)
//! - `providers` contains the vendor adapters
//! - `registry`, `health`, `cache` and `presets` hold shared state
//! - `dispatch` holds the ordering, deadline and fallback logic
//!
//! # Supported Providers
//!
//! - ElevenLabs and Azure Neural TTS (synthesis)
//! - Deepgram (live and batch transcription)
//! - OpenAI TTS and Whisper (synthesis, batch transcription)
//!
//! # Example
//!
//! ```ignore
//! use speech_dispatch::{ProviderCatalog, RegistryBuilder, SynthesisRequest, VoiceService};
//!
//! let config = SpeechDispatchConfig::default();
//! let mut builder = RegistryBuilder::new(config.preset_table()?)
//!     .require_all(config.dispatch.required_capabilities.iter().copied());
//! for adapter in ProviderCatalog::from_config(&config.providers)? {
//!     builder = builder.register(adapter);
//! }
//! let service = VoiceService::new(Arc::new(builder.build()?), &config)?;
//!
//! let cancel = CancellationToken::new();
//! let result = service
//!     .synthesize(&SynthesisRequest::new("Hello, thanks for calling!", "warm"), &cancel)
//!     .await?;
//! println!("{} answered in {}ms", result.provider_used, result.latency_ms);
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod ports;
pub mod presets;
pub mod providers;
pub mod registry;
pub mod service;
pub mod types;

pub use cache::{PhraseCache, PhraseCacheStats, fingerprint};
pub use config::{
    AzureConfig, CacheConfig, DeepgramConfig, DispatchConfig, ElevenLabsConfig, FallbackConfig,
    HealthConfig, OpenAiConfig, ProvidersConfig, SpeechDispatchConfig,
};
pub use dispatch::{SynthesisDispatcher, TranscriptStream, TranscriptionDispatcher};
pub use error::{FailedAttempt, ProviderError, SpeechError};
pub use health::{CallPermit, CircuitState, HealthTracker, ProviderHealth};
pub use ports::{LiveEvent, ProviderEventStream, VoiceProvider};
pub use presets::{PresetDefinition, PresetTable, VoiceParams};
pub use providers::{AzureProvider, DeepgramProvider, ElevenLabsProvider, OpenAiProvider, ProviderCatalog};
pub use registry::{ProviderRecord, ProviderRegistry, RegistryBuilder};
pub use service::{ListenOutcome, PrimeReport, SpeechOutcome, VoiceService};
pub use types::{
    AudioData, AudioFormat, AudioInput, AudioStream, Capability, CapabilitySet, EmotionParams,
    ProviderId, SynthesisRequest, SynthesisResult, TranscriptEvent, Transcription,
    TranscriptionMode, TranscriptionRequest, TranscriptionResult, WordSpan,
};
pub use tokio_util::sync::CancellationToken;
