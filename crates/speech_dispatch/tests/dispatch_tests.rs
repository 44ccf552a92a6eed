//! Dispatcher behavior against scripted providers
//!
//! Covers ordering, fallback, deadlines, circuit breaking, caching, mode
//! separation, cancellation and the degraded-mode facade.

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{Behavior, ScriptedProvider, channel_audio, chunks, fast_config, service};
use futures::StreamExt;
use speech_dispatch::{
    AudioData, AudioFormat, Capability, CancellationToken, CircuitState, EmotionParams,
    ProviderError, ProviderHealth, SpeechError, SpeechOutcome, SynthesisRequest, TranscriptEvent,
    TranscriptionRequest, VoiceService,
};

fn unavailable() -> Behavior {
    Behavior::Fail(ProviderError::Unavailable("HTTP 503: overloaded".to_string()))
}

fn health_of(service: &VoiceService, provider: &str, capability: Capability) -> ProviderHealth {
    service
        .health()
        .into_iter()
        .find(|h| h.provider.as_str() == provider && h.capability == capability)
        .unwrap()
}

// ============ Synthesis ============

#[tokio::test]
async fn warm_greeting_uses_first_provider_with_warm_voice() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let result = service
        .synthesize(
            &SynthesisRequest::new("Hello, thanks for calling!", "warm"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.provider_used.as_str(), "a");
    assert!(!result.cache_hit);
    assert_eq!(result.audio.format(), AudioFormat::Mp3);
    assert!(!result.audio.is_empty());

    let voice = a.last_voice().unwrap();
    assert_eq!(voice.voice_id, "a-warm");
    assert!((voice.stability - 0.5).abs() < f32::EPSILON);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn repeated_synthesis_is_served_from_cache() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();

    let first = service
        .synthesize(&SynthesisRequest::new("Sure, one moment.", "warm"), &cancel)
        .await
        .unwrap();
    // Whitespace differences normalize to the same phrase
    let second = service
        .synthesize(&SynthesisRequest::new("  Sure,   one moment. ", "warm"), &cancel)
        .await
        .unwrap();

    assert!(second.cache_hit);
    assert_eq!(second.latency_ms, 0);
    assert_eq!(second.audio, first.audio);
    assert_eq!(second.provider_used, first.provider_used);
    assert_eq!(a.calls(), 1);

    let stats = service.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn different_emotion_is_a_different_phrase() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();

    service
        .synthesize(&SynthesisRequest::new("Of course.", "warm"), &cancel)
        .await
        .unwrap();
    let calmer = SynthesisRequest::new("Of course.", "warm")
        .with_emotion(EmotionParams::default().with_stability(0.9));
    let result = service.synthesize(&calmer, &cancel).await.unwrap();

    assert!(!result.cache_hit);
    assert_eq!(a.calls(), 2);
    assert!((a.last_voice().unwrap().stability - 0.9).abs() < f32::EPSILON);
}

#[tokio::test]
async fn sliders_sharing_a_cache_entry_share_the_voice_sent() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();
    let with_stability = |stability| {
        SynthesisRequest::new("Of course.", "warm")
            .with_emotion(EmotionParams::default().with_stability(stability))
    };

    service.synthesize(&with_stability(0.501), &cancel).await.unwrap();
    assert!((a.last_voice().unwrap().stability - 0.5).abs() < f32::EPSILON);

    let second = service.synthesize(&with_stability(0.504), &cancel).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(a.calls(), 1);

    let third = service.synthesize(&with_stability(0.51), &cancel).await.unwrap();
    assert!(!third.cache_hit);
    assert!((a.last_voice().unwrap().stability - 0.51).abs() < f32::EPSILON);
}

#[tokio::test]
async fn failing_provider_falls_back_to_next() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(unavailable());
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let result = service
        .synthesize(&SynthesisRequest::new("Let me check.", "warm"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider_used.as_str(), "b");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(b.last_voice().unwrap().voice_id, "b-warm");

    let a_synth = health_of(&service, "a", Capability::Synthesize);
    assert_eq!(a_synth.consecutive_failures, 1);
    assert_eq!(a_synth.state, CircuitState::Closed);
    assert_eq!(health_of(&service, "b", Capability::Synthesize).consecutive_failures, 0);
}

#[tokio::test]
async fn empty_audio_counts_as_failure() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(Behavior::EmptyAudio);
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let result = service
        .synthesize(&SynthesisRequest::new("Got it.", "warm"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.provider_used.as_str(), "b");
}

#[tokio::test]
async fn slow_provider_is_abandoned_at_deadline() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(Behavior::Hang);
    b.set(Behavior::Delay(Duration::from_millis(300)));
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let result = service
        .synthesize(&SynthesisRequest::new("One second please.", "warm"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider_used.as_str(), "b");
    assert_eq!(a.calls(), 1);
    assert!(result.latency_ms >= 290, "latency {} too low", result.latency_ms);
    assert!(result.latency_ms < 500, "latency {} includes the abandoned attempt", result.latency_ms);

    // A timeout counts as one failure against the abandoned provider
    let a_synth = health_of(&service, "a", Capability::Synthesize);
    assert_eq!(a_synth.consecutive_failures, 1);
    assert_eq!(a_synth.state, CircuitState::Closed);
}

#[tokio::test]
async fn exhaustion_reports_every_attempt() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(unavailable());
    b.set(Behavior::Fail(ProviderError::RateLimited("quota".to_string())));
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let err = service
        .synthesize(&SynthesisRequest::new("Goodbye.", "warm"), &CancellationToken::new())
        .await
        .unwrap_err();

    let SpeechError::AllProvidersFailed {
        capability,
        attempts,
        skipped,
    } = err
    else {
        panic!("expected AllProvidersFailed, got {err:?}");
    };
    assert_eq!(capability, Capability::Synthesize);
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].provider.as_str(), "a");
    assert_eq!(attempts[1].error, ProviderError::RateLimited("quota".to_string()));
    assert!(skipped.is_empty());
}

#[tokio::test]
async fn provider_override_is_tried_first() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let request = SynthesisRequest::new("Hi!", "warm").with_provider("b");
    let result = service.synthesize(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.provider_used.as_str(), "b");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn configured_order_is_respected() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    let mut config = fast_config();
    config.dispatch.synthesis_order = vec!["b".into(), "a".into()];
    let service = service(&[a.clone(), b.clone()], &config);

    let result = service
        .synthesize(&SynthesisRequest::new("Hi again!", "warm"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.provider_used.as_str(), "b");
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn invalid_input_never_reaches_providers() {
    let a = ScriptedProvider::synth("a");
    let mut config = fast_config();
    config.dispatch.max_text_chars = 10;
    let service = service(&[a.clone()], &config);
    let cancel = CancellationToken::new();

    for request in [
        SynthesisRequest::new("   ", "warm"),
        SynthesisRequest::new("Hello", "cheerful"),
        SynthesisRequest::new("This is far too long", "warm"),
        SynthesisRequest::new("Hello", "warm")
            .with_emotion(EmotionParams::default().with_stability(1.5)),
        SynthesisRequest::new("Hello", "warm").with_provider("nobody"),
    ] {
        let err = service.synthesize(&request, &cancel).await.unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)), "unexpected {err:?}");
    }
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn cancellation_stops_without_trying_others() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(Behavior::Hang);
    let service = service(&[a.clone(), b.clone()], &fast_config());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = service
        .synthesize(&SynthesisRequest::new("Hold on.", "warm"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SpeechError::Cancelled));
    assert_eq!(b.calls(), 0);
}

// ============ Circuit breaking ============

#[tokio::test]
async fn circuit_opens_then_recovers_after_cooldown() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(unavailable());
    let service = service(&[a.clone(), b.clone()], &fast_config());
    let cancel = CancellationToken::new();

    for i in 0..3 {
        let text = format!("Request number {i}");
        let result = service
            .synthesize(&SynthesisRequest::new(text, "warm"), &cancel)
            .await
            .unwrap();
        assert_eq!(result.provider_used.as_str(), "b");
    }
    assert_eq!(a.calls(), 3);

    // Open: skipped without a call
    let result = service
        .synthesize(&SynthesisRequest::new("Request while open", "warm"), &cancel)
        .await
        .unwrap();
    assert_eq!(result.provider_used.as_str(), "b");
    assert_eq!(a.calls(), 3);

    let health = service.health();
    let a_synth = health
        .iter()
        .find(|h| h.provider.as_str() == "a" && h.capability == Capability::Synthesize)
        .unwrap();
    assert_eq!(a_synth.state, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(250)).await;
    a.set(Behavior::Succeed);

    let result = service
        .synthesize(&SynthesisRequest::new("Request after cooldown", "warm"), &cancel)
        .await
        .unwrap();
    assert_eq!(result.provider_used.as_str(), "a");
    assert_eq!(a.calls(), 4);

    let health = service.health();
    let a_synth = health
        .iter()
        .find(|h| h.provider.as_str() == "a" && h.capability == Capability::Synthesize)
        .unwrap();
    assert_eq!(a_synth.state, CircuitState::Closed);
    assert_eq!(a_synth.consecutive_failures, 0);
}

#[tokio::test]
async fn open_circuits_are_reported_as_skipped() {
    let a = ScriptedProvider::synth("a");
    a.set(unavailable());
    let mut config = fast_config();
    config.health.failure_threshold = 1;
    let service = service(&[a.clone()], &config);
    let cancel = CancellationToken::new();

    let _ = service
        .synthesize(&SynthesisRequest::new("First", "warm"), &cancel)
        .await;
    let err = service
        .synthesize(&SynthesisRequest::new("Second", "warm"), &cancel)
        .await
        .unwrap_err();

    let SpeechError::AllProvidersFailed { attempts, skipped, .. } = err else {
        panic!("expected AllProvidersFailed");
    };
    assert!(attempts.is_empty());
    assert_eq!(skipped.len(), 1);
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn rejected_credentials_flag_operator_attention() {
    let a = ScriptedProvider::synth("a");
    let b = ScriptedProvider::synth("b");
    a.set(Behavior::Fail(ProviderError::Auth("HTTP 401: bad key".to_string())));
    let service = service(&[a.clone(), b.clone()], &fast_config());

    service
        .synthesize(&SynthesisRequest::new("Hello there", "warm"), &CancellationToken::new())
        .await
        .unwrap();

    let attention = service.needs_attention();
    assert_eq!(attention.len(), 1);
    assert_eq!(attention[0].as_str(), "a");
}

// ============ Transcription ============

#[tokio::test]
async fn batch_and_live_pools_are_separate() {
    let live = ScriptedProvider::new("live", &[Capability::TranscribeLive]);
    let batch = ScriptedProvider::new("batch", &[Capability::TranscribeBatch]);
    batch.set(unavailable());
    let service = service(&[live.clone(), batch.clone()], &fast_config());

    let err = service
        .transcribe(
            TranscriptionRequest::batch(AudioData::new("hello", AudioFormat::Wav)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpeechError::AllProvidersFailed {
            capability: Capability::TranscribeBatch,
            ..
        }
    ));
    assert_eq!(batch.calls(), 1);
    assert_eq!(live.calls(), 0);
}

#[tokio::test]
async fn batch_transcription_falls_back() {
    let first = ScriptedProvider::new("first", &[Capability::TranscribeBatch]);
    let second = ScriptedProvider::new("second", &[Capability::TranscribeBatch]);
    first.set(Behavior::Hang);
    let service = service(&[first.clone(), second.clone()], &fast_config());

    let result = service
        .transcribe(
            TranscriptionRequest::batch(AudioData::new("i need help", AudioFormat::Wav))
                .with_language("en-US"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.text, "i need help");
    assert_eq!(result.provider_used.as_str(), "second");
    assert_eq!(result.language, "en-US");
    assert!((result.confidence - 0.9).abs() < f32::EPSILON);
}

#[tokio::test]
async fn batch_request_may_carry_a_stream() {
    let batch = ScriptedProvider::new("batch", &[Capability::TranscribeBatch]);
    let service = service(&[batch.clone()], &fast_config());

    let request = TranscriptionRequest::new(chunks(&["good ", "morning"]), speech_dispatch::TranscriptionMode::Batch);
    let result = service.transcribe(request, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.text, "good morning");
}

#[tokio::test]
async fn transcription_rejects_bad_input() {
    let batch = ScriptedProvider::new("batch", &[Capability::TranscribeBatch]);
    let mut config = fast_config();
    config.dispatch.max_audio_bytes = 8;
    config.dispatch.supported_languages = vec!["en".to_string(), "de".to_string()];
    let service = service(&[batch.clone()], &config);
    let cancel = CancellationToken::new();

    for request in [
        TranscriptionRequest::batch(AudioData::new(Vec::<u8>::new(), AudioFormat::Wav)),
        TranscriptionRequest::batch(AudioData::new("far too many bytes", AudioFormat::Wav)),
        TranscriptionRequest::batch(AudioData::new("ok", AudioFormat::Wav)).with_language("english!"),
        TranscriptionRequest::batch(AudioData::new("ok", AudioFormat::Wav)).with_language("fr"),
    ] {
        let err = service.transcribe(request, &cancel).await.unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)), "unexpected {err:?}");
    }
    assert_eq!(batch.calls(), 0);

    // Region subtags of a supported language are accepted
    service
        .transcribe(
            TranscriptionRequest::batch(AudioData::new("ok", AudioFormat::Wav)).with_language("en-GB"),
            &cancel,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn live_stream_yields_partials_then_final() {
    let live = ScriptedProvider::new("live", &[Capability::TranscribeLive]);
    let service = service(&[live.clone()], &fast_config());

    let stream = service
        .transcribe_stream(
            TranscriptionRequest::live(chunks(&["hel", "lo"])),
            CancellationToken::new(),
        )
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Ok(TranscriptEvent::Partial { text, .. }) if text == "hel"));
    let Ok(TranscriptEvent::Final(result)) = &events[2] else {
        panic!("expected final event");
    };
    assert_eq!(result.text, "hello");
    assert_eq!(result.provider_used.as_str(), "live");
    assert_eq!(result.language, "en");
}

#[tokio::test]
async fn live_fallback_replays_audio_from_the_start() {
    let flaky = ScriptedProvider::new("flaky", &[Capability::TranscribeLive]);
    let steady = ScriptedProvider::new("steady", &[Capability::TranscribeLive]);
    flaky.set(Behavior::DropAfterFirstChunk);
    let service = service(&[flaky.clone(), steady.clone()], &fast_config());

    let result = service
        .transcribe(
            TranscriptionRequest::live(chunks(&["can ", "you ", "hear me"])),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.text, "can you hear me");
    assert_eq!(result.provider_used.as_str(), "steady");
    assert_eq!(flaky.calls(), 1);
}

#[tokio::test]
async fn live_session_with_real_time_audio_delivers_partials() {
    let live = ScriptedProvider::new("live", &[Capability::TranscribeLive]);
    live.set(Behavior::Interleaved(Duration::from_millis(20)));
    let service = service(&[live.clone()], &fast_config());
    let (tx, audio) = channel_audio();

    let caller = tokio::spawn(async move {
        tx.send(Bytes::from_static(b"hel")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(Bytes::from_static(b"lo")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let mut stream = service
        .transcribe_stream(TranscriptionRequest::live(audio), CancellationToken::new())
        .unwrap();

    // The provider reports progress while its next read is still waiting on the caller
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("first event");
    assert!(matches!(first, Some(Ok(TranscriptEvent::Partial { .. }))));

    let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(2), stream.collect::<Vec<_>>())
        .await
        .expect("stream completes");
    let Some(Ok(TranscriptEvent::Final(result))) = rest.last() else {
        panic!("expected final event, got {rest:?}");
    };
    assert_eq!(result.text, "hello");
    assert_eq!(live.calls(), 1);
    caller.await.unwrap();
}

#[tokio::test]
async fn committed_live_session_does_not_fall_back() {
    let flaky = ScriptedProvider::new("flaky", &[Capability::TranscribeLive]);
    let steady = ScriptedProvider::new("steady", &[Capability::TranscribeLive]);
    flaky.set(Behavior::FailAfterPartial);
    let service = service(&[flaky.clone(), steady.clone()], &fast_config());

    let mut stream = service
        .transcribe_stream(
            TranscriptionRequest::live(chunks(&["anyone there"])),
            CancellationToken::new(),
        )
        .unwrap();

    assert!(matches!(stream.next().await, Some(Ok(TranscriptEvent::Partial { .. }))));
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, SpeechError::Provider { ref provider, .. } if provider.as_str() == "flaky"));
    assert!(stream.next().await.is_none());
    assert_eq!(steady.calls(), 0);
}

#[tokio::test]
async fn live_request_is_not_served_by_batch_providers() {
    let batch = ScriptedProvider::new("batch", &[Capability::TranscribeBatch]);
    let live = ScriptedProvider::new("live", &[Capability::TranscribeLive]);
    live.set(unavailable());
    let service = service(&[batch.clone(), live.clone()], &fast_config());

    let err = service
        .transcribe(TranscriptionRequest::live(chunks(&["hi"])), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SpeechError::AllProvidersFailed {
            capability: Capability::TranscribeLive,
            ..
        }
    ));
    assert_eq!(batch.calls(), 0);
}

#[tokio::test]
async fn streaming_requires_live_mode() {
    let live = ScriptedProvider::new("live", &[Capability::TranscribeLive]);
    let service = service(&[live], &fast_config());
    let result = service.transcribe_stream(
        TranscriptionRequest::batch(AudioData::new("x", AudioFormat::Wav)),
        CancellationToken::new(),
    );
    assert!(matches!(result, Err(SpeechError::InvalidInput(_))));
}

// ============ Degraded mode ============

#[tokio::test]
async fn prime_fills_cache_and_enables_apology() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();

    let report = service.prime(&cancel).await;
    assert!(report.apology_ready);
    assert_eq!(report.cached, 2);
    assert!(report.failed.is_empty());

    // Prewarmed phrase is now a cache hit
    let result = service
        .synthesize(&SynthesisRequest::new("Sure, give me just a moment.", "warm"), &cancel)
        .await
        .unwrap();
    assert!(result.cache_hit);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn speak_falls_back_to_apology_audio() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();
    service.prime(&cancel).await;

    a.set(unavailable());
    let outcome = service
        .speak(&SynthesisRequest::new("Your appointment is at noon.", "warm"), &cancel)
        .await;

    let SpeechOutcome::Apology { audio, error } = outcome else {
        panic!("expected apology outcome");
    };
    assert!(audio.is_some());
    assert!(matches!(error, SpeechError::AllProvidersFailed { .. }));
}

#[tokio::test]
async fn speak_reports_cancellation_separately() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a], &fast_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = service
        .speak(&SynthesisRequest::new("Hello", "warm"), &cancel)
        .await;
    assert!(matches!(outcome, SpeechOutcome::Cancelled));
    assert!(outcome.audio().is_none());
}

#[tokio::test]
async fn listen_degrades_to_empty_transcript() {
    let batch = ScriptedProvider::new("batch", &[Capability::TranscribeBatch]);
    batch.set(unavailable());
    let service = service(&[batch], &fast_config());

    let outcome = service
        .listen(
            TranscriptionRequest::batch(AudioData::new("mumble", AudioFormat::Wav)),
            &CancellationToken::new(),
        )
        .await;
    assert!(outcome.failed());
    assert!(outcome.text.is_empty());
    assert!(outcome.result.is_none());
}

#[tokio::test]
async fn clear_cache_forgets_phrases() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();
    let request = SynthesisRequest::new("Thanks!", "warm");

    service.synthesize(&request, &cancel).await.unwrap();
    service.clear_cache().await;
    let result = service.synthesize(&request, &cancel).await.unwrap();

    assert!(!result.cache_hit);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn clear_cache_keeps_apology_audio() {
    let a = ScriptedProvider::synth("a");
    let service = service(&[a.clone()], &fast_config());
    let cancel = CancellationToken::new();
    service.prime(&cancel).await;

    service.clear_cache().await;
    assert_eq!(service.cache_stats().await.entries, 0);

    a.set(unavailable());
    let outcome = service
        .speak(&SynthesisRequest::new("Your table is ready.", "warm"), &cancel)
        .await;
    let SpeechOutcome::Apology { audio, .. } = outcome else {
        panic!("expected apology outcome");
    };
    assert!(audio.is_some());
}
