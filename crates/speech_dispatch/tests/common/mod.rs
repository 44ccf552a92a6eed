//! Scripted providers and builders shared by the dispatcher suites

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use speech_dispatch::{
    AudioData, AudioFormat, AudioStream, Capability, CapabilitySet, LiveEvent, PresetDefinition,
    PresetTable, ProviderError, ProviderEventStream, ProviderId, ProviderRegistry, RegistryBuilder,
    SpeechDispatchConfig, Transcription, VoiceParams, VoiceProvider, VoiceService,
};

/// How a scripted provider answers
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer immediately
    Succeed,
    /// Answer after a delay
    Delay(Duration),
    /// Fail with this error
    Fail(ProviderError),
    /// Never answer
    Hang,
    /// Return a zero-length audio buffer
    EmptyAudio,
    /// Live only: read one chunk, then fail before any event
    DropAfterFirstChunk,
    /// Live only: emit one partial, then fail
    FailAfterPartial,
    /// Live only: report progress on a timer while audio is still arriving
    Interleaved(Duration),
}

/// Provider whose answers are set by the test
#[derive(Debug)]
pub struct ScriptedProvider {
    id: ProviderId,
    capabilities: CapabilitySet,
    behavior: Mutex<Behavior>,
    calls: AtomicU32,
    last_voice: Mutex<Option<VoiceParams>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, capabilities: &[Capability]) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            capabilities: CapabilitySet::of(capabilities),
            behavior: Mutex::new(Behavior::Succeed),
            calls: AtomicU32::new(0),
            last_voice: Mutex::new(None),
        })
    }

    pub fn synth(id: &str) -> Arc<Self> {
        Self::new(id, &[Capability::Synthesize])
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_voice(&self) -> Option<VoiceParams> {
        self.last_voice.lock().clone()
    }

    async fn act(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        match behavior {
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            },
            Behavior::Fail(err) => Err(err),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            },
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VoiceProvider for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioData, ProviderError> {
        *self.last_voice.lock() = Some(params.clone());
        self.act().await?;
        if matches!(*self.behavior.lock(), Behavior::EmptyAudio) {
            return Ok(AudioData::new(Bytes::new(), AudioFormat::Mp3));
        }
        Ok(AudioData::new(format!("{}:{text}", self.id), AudioFormat::Mp3))
    }

    async fn transcribe(&self, audio: AudioData, language: &str) -> Result<Transcription, ProviderError> {
        self.act().await?;
        Ok(Transcription::new(String::from_utf8_lossy(audio.data()).into_owned())
            .with_confidence(0.9)
            .with_language(language))
    }

    async fn transcribe_live(
        &self,
        audio: AudioStream,
        _language: &str,
    ) -> Result<ProviderEventStream, ProviderError> {
        self.act().await?;
        let behavior = self.behavior.lock().clone();
        let (_, _, mut chunks) = audio.into_parts();

        Ok(Box::pin(async_stream::stream! {
            match behavior {
                Behavior::DropAfterFirstChunk => {
                    let _ = chunks.next().await;
                    yield Err(ProviderError::Unavailable("socket dropped".to_string()));
                    return;
                },
                Behavior::FailAfterPartial => {
                    yield Ok(LiveEvent::Partial { text: "partial".to_string(), words: Vec::new() });
                    yield Err(ProviderError::Unavailable("socket dropped".to_string()));
                    return;
                },
                Behavior::Interleaved(every) => {
                    let mut heard = String::new();
                    let mut ticker = tokio::time::interval(every);
                    ticker.tick().await;
                    loop {
                        let next = tokio::select! {
                            chunk = chunks.next() => Some(chunk),
                            _ = ticker.tick() => None,
                        };
                        match next {
                            Some(Some(chunk)) => heard.push_str(&String::from_utf8_lossy(&chunk)),
                            Some(None) => break,
                            None => {
                                yield Ok(LiveEvent::Partial { text: heard.clone(), words: Vec::new() });
                            },
                        }
                    }
                    yield Ok(LiveEvent::Final(Transcription::new(heard).with_confidence(0.8)));
                    return;
                },
                _ => {},
            }

            let mut heard = String::new();
            while let Some(chunk) = chunks.next().await {
                heard.push_str(&String::from_utf8_lossy(&chunk));
                yield Ok(LiveEvent::Partial { text: heard.clone(), words: Vec::new() });
            }
            yield Ok(LiveEvent::Final(Transcription::new(heard).with_confidence(0.8)));
        }))
    }
}

/// Presets giving every listed provider a voice
pub fn presets_for(ids: &[&str]) -> PresetTable {
    let mut definitions = BTreeMap::new();
    for (name, stability) in [("warm", 0.5), ("empathetic", 0.4)] {
        let mut def = PresetDefinition::new(stability, 0.75, 0.3);
        for id in ids {
            def = def.with_voice(*id, format!("{id}-{name}"));
        }
        definitions.insert(name.to_string(), def);
    }
    PresetTable::from_definitions(definitions).unwrap()
}

pub fn registry(providers: &[Arc<ScriptedProvider>]) -> Arc<ProviderRegistry> {
    let ids: Vec<String> = providers.iter().map(|p| p.id().to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let builder = providers.iter().fold(
        RegistryBuilder::new(presets_for(&id_refs)),
        |builder, p| builder.register(Arc::clone(p) as Arc<dyn VoiceProvider>),
    );
    Arc::new(builder.build().unwrap())
}

/// Configuration with short deadlines suitable for tests
pub fn fast_config() -> SpeechDispatchConfig {
    let mut config = SpeechDispatchConfig::default();
    config.dispatch.attempt_timeout_ms = 500;
    config.dispatch.batch_attempt_timeout_ms = 500;
    config.dispatch.live_idle_timeout_ms = 500;
    config.health.failure_threshold = 3;
    config.health.cooldown_ms = 200;
    config.fallback.prewarm_phrases = vec!["Sure, give me just a moment.".to_string()];
    config
}

pub fn service(providers: &[Arc<ScriptedProvider>], config: &SpeechDispatchConfig) -> VoiceService {
    VoiceService::new(registry(providers), config).unwrap()
}

/// Audio fed by the test through a channel, one chunk at a time
pub fn channel_audio() -> (tokio::sync::mpsc::UnboundedSender<Bytes>, AudioStream) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let source = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    (tx, AudioStream::new(AudioFormat::Pcm, source))
}

pub fn chunks(parts: &[&'static str]) -> AudioStream {
    AudioStream::from_chunks(
        AudioFormat::Pcm,
        parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect(),
    )
}
