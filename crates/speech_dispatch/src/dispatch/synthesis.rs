//! Synthesis dispatcher

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{Attempt, Budget, candidates, elapsed_ms, resolve_order, run_attempt};
use crate::cache::{PhraseCache, fingerprint, normalize_text};
use crate::config::DispatchConfig;
use crate::error::{FailedAttempt, ProviderError, SpeechError};
use crate::health::HealthTracker;
use crate::registry::ProviderRegistry;
use crate::types::{Capability, ProviderId, SynthesisRequest, SynthesisResult};

const CAPABILITY: Capability = Capability::Synthesize;

/// Turns text into audio through the first healthy provider that answers
/// in time, consulting the phrase cache first
#[derive(Debug)]
pub struct SynthesisDispatcher {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    cache: Arc<PhraseCache>,
    config: DispatchConfig,
    order: Vec<ProviderId>,
}

impl SynthesisDispatcher {
    /// Create a dispatcher over shared registry, health and cache
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthTracker>,
        cache: Arc<PhraseCache>,
        config: DispatchConfig,
    ) -> Self {
        let order = resolve_order(&registry, config.order_for(CAPABILITY), CAPABILITY);
        Self {
            registry,
            health,
            cache,
            config,
            order,
        }
    }

    /// Default fallback order
    #[must_use]
    pub fn order(&self) -> &[ProviderId] {
        &self.order
    }

    /// Synthesize a request
    ///
    /// # Errors
    ///
    /// - `SpeechError::InvalidInput` before any provider call for bad input
    /// - `SpeechError::Cancelled` if `cancel` fires first
    /// - `SpeechError::AllProvidersFailed` when no candidate produced audio
    #[instrument(
        skip(self, request, cancel),
        fields(profile = %request.voice_profile(), text_len = request.text().len())
    )]
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult, SpeechError> {
        let text = self.validate(request)?;
        if cancel.is_cancelled() {
            return Err(SpeechError::Cancelled);
        }

        let key = fingerprint(&text, request.voice_profile(), request.emotion());
        if let Some(hit) = self.cache.get(&key).await {
            debug!(provider = %hit.provider(), "Serving synthesis from phrase cache");
            return Ok(SynthesisResult {
                audio: hit.audio().clone(),
                provider_used: hit.provider().clone(),
                latency_ms: 0,
                cache_hit: true,
            });
        }

        let candidates = candidates(
            &self.registry,
            &self.order,
            CAPABILITY,
            request.provider_override(),
        )?;
        let budget = Budget::new(self.config.total_budget(CAPABILITY, candidates.len()));
        let mut attempts = Vec::new();
        let mut skipped = Vec::new();

        for provider in candidates {
            let Some(record) = self.registry.get(&provider) else {
                continue;
            };
            let Some(permit) = self.health.try_acquire(&provider, CAPABILITY) else {
                debug!(provider = %provider, "Skipping provider with open circuit");
                skipped.push(provider);
                continue;
            };
            let Some(deadline) = budget.next_attempt(self.config.attempt_timeout(CAPABILITY)) else {
                warn!(provider = %provider, "Synthesis budget exhausted");
                break;
            };
            let params = self.registry.presets().resolve(
                request.voice_profile(),
                &provider,
                request.emotion(),
            )?;

            let started = Instant::now();
            let adapter = Arc::clone(record.adapter());
            let outcome = run_attempt(adapter.synthesize(&text, &params), deadline, cancel).await;
            let elapsed = elapsed_ms(started);

            let error = match outcome {
                Attempt::Succeeded(audio) if !audio.is_empty() => {
                    permit.succeed();
                    info!(provider = %provider, latency_ms = elapsed, "Synthesis succeeded");
                    self.cache
                        .insert(key, audio.clone(), provider.clone())
                        .await;
                    return Ok(SynthesisResult {
                        audio,
                        provider_used: provider,
                        latency_ms: elapsed,
                        cache_hit: false,
                    });
                },
                Attempt::Succeeded(_) => ProviderError::Unavailable("empty audio response".to_string()),
                Attempt::Failed(err) => err,
                Attempt::Cancelled => {
                    info!(provider = %provider, "Synthesis cancelled by caller");
                    return Err(SpeechError::Cancelled);
                },
            };

            warn!(
                provider = %provider,
                kind = error.kind(),
                error = %error,
                elapsed_ms = elapsed,
                "Synthesis attempt failed, trying next provider"
            );
            permit.fail(&error);
            attempts.push(FailedAttempt {
                provider,
                error,
                elapsed_ms: elapsed,
            });
        }

        warn!(
            attempts = attempts.len(),
            skipped = skipped.len(),
            "All synthesis providers failed"
        );
        Err(SpeechError::AllProvidersFailed {
            capability: CAPABILITY,
            attempts,
            skipped,
        })
    }

    /// Check a request and return its normalized text
    fn validate(&self, request: &SynthesisRequest) -> Result<String, SpeechError> {
        let text = normalize_text(request.text());
        if text.is_empty() {
            return Err(SpeechError::InvalidInput("Text cannot be empty".to_string()));
        }
        let chars = text.chars().count();
        if chars > self.config.max_text_chars {
            return Err(SpeechError::InvalidInput(format!(
                "Text too long: {chars} characters exceeds {} limit",
                self.config.max_text_chars
            )));
        }
        if !self.registry.presets().contains(request.voice_profile()) {
            return Err(SpeechError::InvalidInput(format!(
                "Unknown voice profile: {}",
                request.voice_profile()
            )));
        }
        if let Some(emotion) = request.emotion() {
            emotion.validate().map_err(SpeechError::InvalidInput)?;
        }
        Ok(text)
    }
}
