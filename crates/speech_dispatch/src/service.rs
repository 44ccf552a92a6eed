//! Voice service facade
//!
//! Owns the shared registry, health and cache state and exposes the two
//! dispatchers. The `speak`/`listen` pair is for the live call path: it
//! never returns an error, degrading to the primed apology audio or to an
//! empty transcript instead.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::{PhraseCache, PhraseCacheStats};
use crate::config::{FallbackConfig, SpeechDispatchConfig};
use crate::dispatch::{SynthesisDispatcher, TranscriptStream, TranscriptionDispatcher};
use crate::error::SpeechError;
use crate::health::{HealthTracker, ProviderHealth};
use crate::registry::ProviderRegistry;
use crate::types::{
    AudioData, ProviderId, SynthesisRequest, SynthesisResult, TranscriptionRequest,
    TranscriptionResult,
};

/// What the call path should play
#[derive(Debug)]
pub enum SpeechOutcome {
    /// Synthesis succeeded
    Spoken(SynthesisResult),
    /// Synthesis failed; play the apology if one was primed
    Apology {
        /// Primed apology audio
        audio: Option<AudioData>,
        /// Why synthesis failed
        error: SpeechError,
    },
    /// The caller hung up or the turn was abandoned
    Cancelled,
}

impl SpeechOutcome {
    /// Audio to play, if any
    #[must_use]
    pub const fn audio(&self) -> Option<&AudioData> {
        match self {
            Self::Spoken(result) => Some(&result.audio),
            Self::Apology { audio, .. } => audio.as_ref(),
            Self::Cancelled => None,
        }
    }
}

/// What the call path heard
#[derive(Debug)]
pub struct ListenOutcome {
    /// Transcript text; empty when transcription failed
    pub text: String,
    /// Full result when transcription succeeded
    pub result: Option<TranscriptionResult>,
    /// Failure, when there was one
    pub error: Option<SpeechError>,
}

impl ListenOutcome {
    /// Whether transcription failed or was cancelled
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of priming the phrase cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct PrimeReport {
    /// Phrases now in the cache
    pub cached: usize,
    /// Phrases that could not be synthesized, with the reason
    pub failed: Vec<(String, String)>,
    /// Whether apology audio is available for degraded mode
    pub apology_ready: bool,
}

/// Entry point for voice synthesis and transcription
#[derive(Debug)]
pub struct VoiceService {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    cache: Arc<PhraseCache>,
    synthesis: SynthesisDispatcher,
    transcription: TranscriptionDispatcher,
    fallback: FallbackConfig,
    apology: RwLock<Option<AudioData>>,
}

impl VoiceService {
    /// Create a service over a built registry
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the configuration is invalid.
    pub fn new(registry: Arc<ProviderRegistry>, config: &SpeechDispatchConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Configuration)?;

        let health = Arc::new(HealthTracker::new(&registry, config.health));
        let cache = Arc::new(PhraseCache::new(&config.cache));
        let synthesis = SynthesisDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            Arc::clone(&cache),
            config.dispatch.clone(),
        );
        let transcription = TranscriptionDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            config.dispatch.clone(),
        );

        info!(
            providers = registry.len(),
            synthesis_order = ?synthesis.order(),
            "Voice service ready"
        );

        Ok(Self {
            registry,
            health,
            cache,
            synthesis,
            transcription,
            fallback: config.fallback.clone(),
            apology: RwLock::new(None),
        })
    }

    /// Synthesize speech; see [`SynthesisDispatcher::synthesize`]
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult, SpeechError> {
        self.synthesis.synthesize(request, cancel).await
    }

    /// Transcribe to completion; see [`TranscriptionDispatcher::transcribe`]
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, SpeechError> {
        self.transcription.transcribe(request, cancel).await
    }

    /// Open a live transcript; see [`TranscriptionDispatcher::transcribe_stream`]
    pub fn transcribe_stream(
        &self,
        request: TranscriptionRequest,
        cancel: CancellationToken,
    ) -> Result<TranscriptStream, SpeechError> {
        self.transcription.transcribe_stream(request, cancel)
    }

    /// Synthesize for the live call path, never failing
    pub async fn speak(&self, request: &SynthesisRequest, cancel: &CancellationToken) -> SpeechOutcome {
        match self.synthesis.synthesize(request, cancel).await {
            Ok(result) => SpeechOutcome::Spoken(result),
            Err(SpeechError::Cancelled) => SpeechOutcome::Cancelled,
            Err(error) => {
                if error.involves_auth_failure() {
                    error!(error = %error, "Synthesis failed with rejected credentials, operator attention needed");
                } else {
                    warn!(error = %error, "Synthesis failed, falling back to apology");
                }
                SpeechOutcome::Apology {
                    audio: self.apology.read().clone(),
                    error,
                }
            },
        }
    }

    /// Transcribe for the live call path, never failing
    pub async fn listen(&self, request: TranscriptionRequest, cancel: &CancellationToken) -> ListenOutcome {
        match self.transcription.transcribe(request, cancel).await {
            Ok(result) => ListenOutcome {
                text: result.text.clone(),
                result: Some(result),
                error: None,
            },
            Err(error) => {
                if !matches!(error, SpeechError::Cancelled) {
                    warn!(error = %error, "Transcription failed, continuing with empty transcript");
                }
                ListenOutcome {
                    text: String::new(),
                    result: None,
                    error: Some(error),
                }
            },
        }
    }

    /// Synthesize the apology and every prewarm phrase into the cache
    ///
    /// Failures are reported, not returned; a failed prime leaves the
    /// service fully usable.
    pub async fn prime(&self, cancel: &CancellationToken) -> PrimeReport {
        let mut report = PrimeReport::default();

        let apology = SynthesisRequest::new(&self.fallback.apology_text, &self.fallback.apology_profile);
        match self.synthesis.synthesize(&apology, cancel).await {
            Ok(result) => {
                *self.apology.write() = Some(result.audio);
                report.apology_ready = true;
                report.cached += 1;
            },
            Err(e) => {
                warn!(error = %e, "Could not prime apology phrase");
                report.failed.push((self.fallback.apology_text.clone(), e.to_string()));
            },
        }

        for phrase in &self.fallback.prewarm_phrases {
            if cancel.is_cancelled() {
                break;
            }
            let request = SynthesisRequest::new(phrase, &self.fallback.prewarm_profile);
            match self.synthesis.synthesize(&request, cancel).await {
                Ok(_) => report.cached += 1,
                Err(e) => {
                    warn!(phrase = %phrase, error = %e, "Could not prime phrase");
                    report.failed.push((phrase.clone(), e.to_string()));
                },
            }
        }

        info!(
            cached = report.cached,
            failed = report.failed.len(),
            apology_ready = report.apology_ready,
            "Phrase cache primed"
        );
        report
    }

    /// Health of every (provider, capability) pair
    #[must_use]
    pub fn health(&self) -> Vec<ProviderHealth> {
        self.health.snapshots()
    }

    /// Providers whose credentials were rejected
    #[must_use]
    pub fn needs_attention(&self) -> Vec<ProviderId> {
        self.health.needs_attention()
    }

    /// Phrase cache counters
    pub async fn cache_stats(&self) -> PhraseCacheStats {
        self.cache.stats().await
    }

    /// Drop every cached phrase
    ///
    /// The primed apology is held outside the cache and survives, so
    /// degraded mode keeps working until the next [`Self::prime`].
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        info!("Phrase cache cleared");
    }

    /// Registered providers
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}
