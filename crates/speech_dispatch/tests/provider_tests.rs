//! Vendor adapters against mocked HTTP APIs

use secrecy::SecretString;
use speech_dispatch::{
    AudioData, AudioFormat, AzureConfig, AzureProvider, DeepgramConfig, DeepgramProvider,
    ElevenLabsConfig, ElevenLabsProvider, OpenAiConfig, OpenAiProvider, ProviderError,
    VoiceParams, VoiceProvider,
};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn params(voice_id: &str) -> VoiceParams {
    VoiceParams {
        voice_id: voice_id.to_string(),
        stability: 0.5,
        similarity_boost: 0.75,
        style: 0.3,
        speed: 1.0,
    }
}

/// Minimal MP3 frame header
fn mock_mp3_audio() -> Vec<u8> {
    vec![0xFF, 0xFB, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00]
}

// ============ ElevenLabs ============

fn elevenlabs(base_url: &str) -> ElevenLabsProvider {
    ElevenLabsProvider::new(ElevenLabsConfig {
        api_key: Some(SecretString::from("xi-test-key")),
        base_url: base_url.to_string(),
        ..ElevenLabsConfig::default()
    })
    .expect("Failed to create provider")
}

#[tokio::test]
async fn elevenlabs_synthesis_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
        .and(header("xi-api-key", "xi-test-key"))
        .and(body_partial_json(serde_json::json!({
            "text": "Hello, thanks for calling!",
            "model_id": "eleven_turbo_v2",
            "voice_settings": {"use_speaker_boost": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(mock_mp3_audio()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = elevenlabs(&mock_server.uri());
    let audio = provider
        .synthesize("Hello, thanks for calling!", &params("21m00Tcm4TlvDq8ikWAM"))
        .await
        .unwrap();

    assert_eq!(audio.format(), AudioFormat::Mp3);
    assert_eq!(audio.data(), mock_mp3_audio().as_slice());
}

#[tokio::test]
async fn elevenlabs_unauthorized_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail":"invalid_api_key"}"#))
        .mount(&mock_server)
        .await;

    let err = elevenlabs(&mock_server.uri())
        .synthesize("Hi", &params("voice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Auth(_)));
    assert!(err.requires_operator_attention());
}

#[tokio::test]
async fn elevenlabs_rate_limit_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
        .mount(&mock_server)
        .await;

    let err = elevenlabs(&mock_server.uri())
        .synthesize("Hi", &params("voice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(_)));
}

// ============ Azure ============

#[tokio::test]
async fn azure_synthesis_sends_ssml() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .and(header("Ocp-Apim-Subscription-Key", "azure-key"))
        .and(header("Content-Type", "application/ssml+xml"))
        .and(header("X-Microsoft-OutputFormat", "audio-16khz-128kbitrate-mono-mp3"))
        .and(body_string_contains("<voice name='en-US-AriaNeural'>"))
        .and(body_string_contains("rate='-5%'"))
        .and(body_string_contains("Tom &amp; Jerry"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(mock_mp3_audio()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = AzureProvider::new(AzureConfig {
        api_key: Some(SecretString::from("azure-key")),
        endpoint: Some(format!("{}/cognitiveservices/v1", mock_server.uri())),
        ..AzureConfig::default()
    })
    .unwrap();

    let mut voice = params("en-US-AriaNeural");
    voice.speed = 0.95;
    let audio = provider.synthesize("Tom & Jerry", &voice).await.unwrap();
    assert_eq!(audio.format(), AudioFormat::Mp3);
    assert!(!audio.is_empty());
}

#[tokio::test]
async fn azure_server_error_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&mock_server)
        .await;

    let provider = AzureProvider::new(AzureConfig {
        api_key: Some(SecretString::from("azure-key")),
        endpoint: Some(mock_server.uri()),
        ..AzureConfig::default()
    })
    .unwrap();

    let err = provider.synthesize("Hi", &params("v")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(ref msg) if msg.contains("503")));
}

// ============ Deepgram (batch) ============

fn deepgram(base_url: &str) -> DeepgramProvider {
    DeepgramProvider::new(DeepgramConfig {
        api_key: Some(SecretString::from("dg-key")),
        base_url: base_url.to_string(),
        ..DeepgramConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn deepgram_batch_transcription_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/listen"))
        .and(header("Authorization", "Token dg-key"))
        .and(header("Content-Type", "audio/wav"))
        .and(query_param("model", "nova-2"))
        .and(query_param("language", "en"))
        .and(query_param("punctuate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadata": {"request_id": "abc"},
            "results": {"channels": [{"alternatives": [{
                "transcript": "I'd like to book a table.",
                "confidence": 0.97,
                "words": [
                    {"word": "i'd", "punctuated_word": "I'd", "start": 0.08, "end": 0.3, "confidence": 0.99},
                    {"word": "like", "start": 0.3, "end": 0.5, "confidence": 0.98}
                ]
            }]}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transcription = deepgram(&mock_server.uri())
        .transcribe(AudioData::new(vec![1_u8, 2, 3, 4], AudioFormat::Wav), "en")
        .await
        .unwrap();

    assert_eq!(transcription.text, "I'd like to book a table.");
    assert!((transcription.confidence - 0.97).abs() < 1e-6);
    assert_eq!(transcription.words.len(), 2);
    assert_eq!(transcription.words[0].word, "I'd");
    assert_eq!(transcription.words[0].start_ms, 80);
}

#[tokio::test]
async fn deepgram_pcm_announces_encoding() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/listen"))
        .and(query_param("encoding", "linear16"))
        .and(query_param("sample_rate", "8000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": {"channels": [{"alternatives": [{"transcript": "yes", "confidence": 0.9}]}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let audio = AudioData::new(vec![0_u8; 32], AudioFormat::Pcm).with_sample_rate(8000);
    let transcription = deepgram(&mock_server.uri()).transcribe(audio, "en").await.unwrap();
    assert_eq!(transcription.text, "yes");
}

#[tokio::test]
async fn deepgram_empty_channels_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": {"channels": []}
        })))
        .mount(&mock_server)
        .await;

    let err = deepgram(&mock_server.uri())
        .transcribe(AudioData::new(vec![1_u8], AudioFormat::Wav), "en")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
}

// ============ OpenAI ============

fn openai(base_url: &str) -> OpenAiProvider {
    OpenAiProvider::new(OpenAiConfig {
        api_key: Some(SecretString::from("test-api-key")),
        base_url: base_url.to_string(),
        ..OpenAiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn whisper_transcription_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_string_contains("verbose_json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "text": " Hello, this is a test transcription.",
            "language": "english",
            "words": [
                {"word": "Hello", "start": 0.0, "end": 0.4},
                {"word": "this", "start": 0.5, "end": 0.7}
            ],
            "segments": [{"avg_logprob": -0.05}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transcription = openai(&mock_server.uri())
        .transcribe(AudioData::new(mock_mp3_audio(), AudioFormat::Mp3), "en-US")
        .await
        .unwrap();

    assert_eq!(transcription.text, "Hello, this is a test transcription.");
    assert_eq!(transcription.language.as_deref(), Some("english"));
    assert_eq!(transcription.words.len(), 2);
    assert!(transcription.confidence > 0.9);
}

#[tokio::test]
async fn whisper_rate_limit_code_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "Slow down", "type": "requests", "code": "rate_limit_exceeded"}
        })))
        .mount(&mock_server)
        .await;

    let err = openai(&mock_server.uri())
        .transcribe(AudioData::new(mock_mp3_audio(), AudioFormat::Mp3), "en")
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::RateLimited("Slow down".to_string()));
}

#[tokio::test]
async fn openai_tts_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "tts-1",
            "input": "Thanks for calling!",
            "voice": "nova",
            "response_format": "mp3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(mock_mp3_audio()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let audio = openai(&mock_server.uri())
        .synthesize("Thanks for calling!", &params("nova"))
        .await
        .unwrap();
    assert_eq!(audio.format(), AudioFormat::Mp3);
    assert_eq!(audio.size_bytes(), mock_mp3_audio().len());
}

#[tokio::test]
async fn openai_invalid_key_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .mount(&mock_server)
        .await;

    let err = openai(&mock_server.uri())
        .synthesize("Hi", &params("nova"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Auth(_)));
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    // Nothing listens on this port
    let err = openai("http://127.0.0.1:9")
        .synthesize("Hi", &params("nova"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_) | ProviderError::Timeout));
}
