//! Transcription dispatcher
//!
//! BATCH and LIVE requests draw from disjoint provider pools and never
//! substitute for each other. A LIVE session can still fall back to the
//! next provider until it delivers its first event; after that the call is
//! committed to that provider and a failure ends the stream.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::live_feed::LiveFeed;
use super::{Attempt, Budget, candidates, elapsed_ms, resolve_order, run_attempt};
use crate::config::{DispatchConfig, is_language_tag};
use crate::error::{FailedAttempt, ProviderError, SpeechError};
use crate::health::HealthTracker;
use crate::ports::{LiveEvent, ProviderEventStream};
use crate::registry::ProviderRegistry;
use crate::types::{
    AudioData, AudioInput, AudioStream, Capability, ProviderId, TranscriptEvent,
    TranscriptionMode, TranscriptionRequest, TranscriptionResult,
};

/// Live transcript: partial events, then one final event or an error
pub type TranscriptStream = Pin<Box<dyn Stream<Item = Result<TranscriptEvent, SpeechError>> + Send>>;

/// Routes transcription requests to the provider pool of their mode
#[derive(Debug)]
pub struct TranscriptionDispatcher {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    config: DispatchConfig,
    live_order: Vec<ProviderId>,
    batch_order: Vec<ProviderId>,
}

impl TranscriptionDispatcher {
    /// Create a dispatcher over shared registry and health state
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        health: Arc<HealthTracker>,
        config: DispatchConfig,
    ) -> Self {
        let order = |capability| resolve_order(&registry, config.order_for(capability), capability);
        let live_order = order(Capability::TranscribeLive);
        let batch_order = order(Capability::TranscribeBatch);
        Self {
            registry,
            health,
            config,
            live_order,
            batch_order,
        }
    }

    /// Default fallback order for a mode
    #[must_use]
    pub fn order(&self, mode: TranscriptionMode) -> &[ProviderId] {
        match mode {
            TranscriptionMode::Live => &self.live_order,
            TranscriptionMode::Batch => &self.batch_order,
        }
    }

    /// Transcribe a request to completion
    ///
    /// LIVE requests are driven through [`Self::transcribe_stream`] and
    /// resolve to its final event.
    ///
    /// # Errors
    ///
    /// - `SpeechError::InvalidInput` for empty or oversize audio and bad language tags
    /// - `SpeechError::Cancelled` if `cancel` fires first
    /// - `SpeechError::AllProvidersFailed` when no candidate produced a transcript
    /// - `SpeechError::Provider` when a committed live session fails
    #[instrument(skip(self, request, cancel), fields(mode = %request.mode()))]
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, SpeechError> {
        match request.mode() {
            TranscriptionMode::Batch => self.transcribe_batch(request, cancel).await,
            TranscriptionMode::Live => {
                let mut stream = self.transcribe_stream(request, cancel.clone())?;
                while let Some(event) = stream.next().await {
                    if let TranscriptEvent::Final(result) = event? {
                        return Ok(result);
                    }
                }
                // The stream only ends without a final event when cancelled
                Err(SpeechError::Cancelled)
            },
        }
    }

    async fn transcribe_batch(
        &self,
        request: TranscriptionRequest,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, SpeechError> {
        const CAPABILITY: Capability = Capability::TranscribeBatch;

        let language = self.language(request.language())?;
        let candidates = candidates(
            &self.registry,
            &self.batch_order,
            CAPABILITY,
            request.provider_override(),
        )?;
        let audio = match request.into_audio() {
            AudioInput::Buffer(audio) => audio,
            AudioInput::Stream(stream) => self.collect(stream, cancel).await?,
        };
        self.check_audio(&audio)?;

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
                warn!(provider = %provider, "Transcription budget exhausted");
                break;
            };

            let started = Instant::now();
            let adapter = Arc::clone(record.adapter());
            let outcome = run_attempt(adapter.transcribe(audio.clone(), &language), deadline, cancel).await;
            let elapsed = elapsed_ms(started);

            match outcome {
                Attempt::Succeeded(transcription) => {
                    permit.succeed();
                    info!(
                        provider = %provider,
                        latency_ms = elapsed,
                        words = transcription.words.len(),
                        "Batch transcription succeeded"
                    );
                    return Ok(TranscriptionResult::from_transcription(
                        transcription,
                        provider,
                        &language,
                        elapsed,
                    ));
                },
                Attempt::Failed(error) => {
                    warn!(
                        provider = %provider,
                        kind = error.kind(),
                        error = %error,
                        elapsed_ms = elapsed,
                        "Batch transcription attempt failed, trying next provider"
                    );
                    permit.fail(&error);
                    attempts.push(FailedAttempt {
                        provider,
                        error,
                        elapsed_ms: elapsed,
                    });
                },
                Attempt::Cancelled => {
                    info!(provider = %provider, "Transcription cancelled by caller");
                    return Err(SpeechError::Cancelled);
                },
            }
        }

        Err(SpeechError::AllProvidersFailed {
            capability: CAPABILITY,
            attempts,
            skipped,
        })
    }

    /// Open a LIVE transcript stream
    ///
    /// Validation happens here; provider selection happens lazily as the
    /// stream is polled. The stream yields `Partial` events and ends with
    /// exactly one `Final` event, or with a single error.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::InvalidInput` for a BATCH request, a bad
    /// language tag, an unknown override, or an empty/oversize buffer.
    pub fn transcribe_stream(
        &self,
        request: TranscriptionRequest,
        cancel: CancellationToken,
    ) -> Result<TranscriptStream, SpeechError> {
        const CAPABILITY: Capability = Capability::TranscribeLive;

        if request.mode() != TranscriptionMode::Live {
            return Err(SpeechError::InvalidInput(
                "Streaming transcription requires a live request".to_string(),
            ));
        }
        let language = self.language(request.language())?;
        let candidates = candidates(
            &self.registry,
            &self.live_order,
            CAPABILITY,
            request.provider_override(),
        )?;
        let audio = match request.into_audio() {
            AudioInput::Stream(stream) => stream,
            AudioInput::Buffer(audio) => {
                self.check_audio(&audio)?;
                let (format, rate) = (audio.format(), audio.sample_rate());
                let stream = AudioStream::from_chunks(format, vec![audio.into_bytes()]);
                match rate {
                    Some(rate) => stream.with_sample_rate(rate),
                    None => stream,
                }
            },
        };

        let registry = Arc::clone(&self.registry);
        let health = Arc::clone(&self.health);
        let attempt_timeout = self.config.attempt_timeout(CAPABILITY);
        let idle_timeout = self.config.live_idle_timeout();
        let budget = Budget::new(self.config.total_budget(CAPABILITY, candidates.len()));
        let max_replay_bytes = self.config.max_replay_bytes;

        Ok(Box::pin(async_stream::stream! {
            let feed = LiveFeed::new(audio, max_replay_bytes);
            let mut attempts = Vec::new();
            let mut skipped = Vec::new();
            let mut committed = None;

            for provider in candidates {
                let Some(record) = registry.get(&provider) else {
                    continue;
                };
                let Some(permit) = health.try_acquire(&provider, CAPABILITY) else {
                    debug!(provider = %provider, "Skipping provider with open circuit");
                    skipped.push(provider);
                    continue;
                };
                let Some(deadline) = budget.next_attempt(attempt_timeout) else {
                    warn!(provider = %provider, "Live transcription budget exhausted");
                    break;
                };
                let Some(audio) = feed.subscribe() else {
                    warn!(provider = %provider, "Live audio can no longer be replayed, not falling back");
                    break;
                };

                let started = Instant::now();
                let adapter = Arc::clone(record.adapter());
                let session = run_attempt(adapter.transcribe_live(audio, &language), deadline, &cancel).await;
                let outcome = match session {
                    Attempt::Succeeded(mut events) => {
                        match run_attempt(next_event(&mut events), idle_timeout, &cancel).await {
                            Attempt::Succeeded(first) => Attempt::Succeeded((events, first)),
                            Attempt::Failed(err) => Attempt::Failed(err),
                            Attempt::Cancelled => Attempt::Cancelled,
                        }
                    },
                    Attempt::Failed(err) => Attempt::Failed(err),
                    Attempt::Cancelled => Attempt::Cancelled,
                };

                match outcome {
                    Attempt::Succeeded((events, first)) => {
                        feed.commit();
                        info!(provider = %provider, "Live transcription session committed");
                        committed = Some((provider, permit, events, first, started));
                        break;
                    },
                    Attempt::Failed(error) => {
                        let elapsed = elapsed_ms(started);
                        warn!(
                            provider = %provider,
                            kind = error.kind(),
                            error = %error,
                            elapsed_ms = elapsed,
                            "Live transcription attempt failed, trying next provider"
                        );
                        permit.fail(&error);
                        attempts.push(FailedAttempt { provider, error, elapsed_ms: elapsed });
                    },
                    Attempt::Cancelled => {
                        yield Err(SpeechError::Cancelled);
                        return;
                    },
                }
            }

            let Some((provider, permit, mut events, first, started)) = committed else {
                yield Err(SpeechError::AllProvidersFailed {
                    capability: CAPABILITY,
                    attempts,
                    skipped,
                });
                return;
            };

            let mut pending = Some(first);
            loop {
                let event = match pending.take() {
                    Some(event) => event,
                    None => match run_attempt(next_event(&mut events), idle_timeout, &cancel).await {
                        Attempt::Succeeded(event) => event,
                        Attempt::Failed(error) => {
                            warn!(provider = %provider, error = %error, "Committed live session failed");
                            permit.fail(&error);
                            yield Err(SpeechError::Provider { provider, source: error });
                            return;
                        },
                        Attempt::Cancelled => {
                            yield Err(SpeechError::Cancelled);
                            return;
                        },
                    },
                };

                match event {
                    LiveEvent::Partial { text, words } => {
                        yield Ok(TranscriptEvent::Partial { text, words });
                    },
                    LiveEvent::Final(transcription) => {
                        permit.succeed();
                        let latency_ms = elapsed_ms(started);
                        info!(provider = %provider, latency_ms, "Live transcription completed");
                        yield Ok(TranscriptEvent::Final(TranscriptionResult::from_transcription(
                            transcription,
                            provider,
                            &language,
                            latency_ms,
                        )));
                        return;
                    },
                }
            }
        }))
    }

    fn language(&self, hint: Option<&str>) -> Result<String, SpeechError> {
        let language = hint.map_or_else(|| self.config.default_language.clone(), str::to_string);
        if !is_language_tag(&language) {
            return Err(SpeechError::InvalidInput(format!(
                "Invalid language tag: {language}"
            )));
        }
        let supported = &self.config.supported_languages;
        if !supported.is_empty() {
            let primary = language.split('-').next().unwrap_or(language.as_str());
            let accepted = supported
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&language) || s.eq_ignore_ascii_case(primary));
            if !accepted {
                return Err(SpeechError::InvalidInput(format!(
                    "Unsupported language: {language}"
                )));
            }
        }
        Ok(language)
    }

    fn check_audio(&self, audio: &AudioData) -> Result<(), SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::InvalidInput("Audio cannot be empty".to_string()));
        }
        if audio.size_bytes() > self.config.max_audio_bytes {
            return Err(SpeechError::InvalidInput(format!(
                "Audio too large: {} bytes exceeds {} limit",
                audio.size_bytes(),
                self.config.max_audio_bytes
            )));
        }
        Ok(())
    }

    /// Buffer a stream for batch transcription, bounded by size and idle gaps
    async fn collect(
        &self,
        stream: AudioStream,
        cancel: &CancellationToken,
    ) -> Result<AudioData, SpeechError> {
        let (format, sample_rate, mut chunks) = stream.into_parts();
        let idle: Duration = self.config.live_idle_timeout();
        let mut buffer = BytesMut::new();

        loop {
            let next = tokio::select! {
                biased;

                () = cancel.cancelled() => return Err(SpeechError::Cancelled),
                next = tokio::time::timeout(idle, chunks.next()) => next,
            };
            let Ok(next) = next else {
                return Err(SpeechError::InvalidInput(
                    "Audio stream stalled before completing".to_string(),
                ));
            };
            let Some(chunk) = next else {
                break;
            };
            if buffer.len() + chunk.len() > self.config.max_audio_bytes {
                return Err(SpeechError::InvalidInput(format!(
                    "Audio too large: exceeds {} bytes",
                    self.config.max_audio_bytes
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        let audio = AudioData::new(buffer.freeze(), format);
        Ok(match sample_rate {
            Some(rate) => audio.with_sample_rate(rate),
            None => audio,
        })
    }
}

async fn next_event(events: &mut ProviderEventStream) -> Result<LiveEvent, ProviderError> {
    events.next().await.unwrap_or_else(|| {
        Err(ProviderError::Unavailable(
            "stream ended before a final transcript".to_string(),
        ))
    })
}
