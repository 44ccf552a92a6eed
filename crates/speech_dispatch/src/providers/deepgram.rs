//! Deepgram adapter
//!
//! Batch audio goes to the REST `listen` endpoint. Live audio is streamed
//! over a WebSocket: interim results surface as partial events and
//! finalised segments are joined into the final transcript once the
//! server flushes after `CloseStream`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, instrument, warn};

use super::{ensure_success, http_client};
use crate::config::DeepgramConfig;
use crate::error::{ProviderError, SpeechError};
use crate::ports::{LiveEvent, ProviderEventStream, VoiceProvider};
use crate::types::{
    AudioData, AudioFormat, AudioStream, Capability, CapabilitySet, ProviderId, Transcription,
    WordSpan,
};

const CLOSE_STREAM: &str = r#"{"type":"CloseStream"}"#;

/// Deepgram batch and live transcription
#[derive(Debug, Clone)]
pub struct DeepgramProvider {
    id: ProviderId,
    client: Client,
    config: DeepgramConfig,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    word: String,
    #[serde(default)]
    punctuated_word: Option<String>,
    start: f64,
    end: f64,
    #[serde(default)]
    confidence: Option<f32>,
}

impl Word {
    fn into_span(self) -> WordSpan {
        let text = self.punctuated_word.unwrap_or(self.word);
        let span = WordSpan::from_seconds(text, self.start, self.end);
        match self.confidence {
            Some(c) => span.with_confidence(c),
            None => span,
        }
    }
}

/// Server message on the live socket
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamMessage {
    Results {
        #[serde(default)]
        channel: Channel,
        #[serde(default)]
        is_final: bool,
    },
    Metadata {},
    #[serde(other)]
    Other,
}

/// Finalised segments collected over a live session
#[derive(Debug, Default)]
struct SegmentLog {
    texts: Vec<String>,
    words: Vec<WordSpan>,
    confidence_sum: f32,
    segments: u32,
}

impl SegmentLog {
    fn push(&mut self, alternative: Alternative) {
        let text = alternative.transcript.trim();
        if text.is_empty() {
            return;
        }
        self.texts.push(text.to_string());
        self.words
            .extend(alternative.words.into_iter().map(Word::into_span));
        self.confidence_sum += alternative.confidence;
        self.segments += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Transcription {
        let confidence = if self.segments == 0 {
            0.0
        } else {
            self.confidence_sum / self.segments as f32
        };
        Transcription::new(self.texts.join(" "))
            .with_words(self.words)
            .with_confidence(confidence)
    }
}

enum Step {
    Chunk(Option<bytes::Bytes>),
    Server(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

impl DeepgramProvider {
    /// Provider id used for registration
    pub const ID: &'static str = "deepgram";

    /// Create the adapter
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: DeepgramConfig) -> Result<Self, SpeechError> {
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

    fn listen_url(&self) -> String {
        format!("{}/listen", self.config.base_url.trim_end_matches('/'))
    }

    fn streaming_url(&self, language: &str, format: AudioFormat, sample_rate: Option<u32>) -> Result<Url, ProviderError> {
        let mut params = vec![
            ("model", self.config.model.clone()),
            ("language", language.to_string()),
            ("punctuate", "true".to_string()),
            ("interim_results", self.config.interim_results.to_string()),
        ];
        if format == AudioFormat::Pcm {
            params.push(("encoding", self.config.encoding.clone()));
            params.push((
                "sample_rate",
                sample_rate.unwrap_or(self.config.sample_rate).to_string(),
            ));
        }
        Url::parse_with_params(&self.config.streaming_url, &params)
            .map_err(|e| ProviderError::Unavailable(format!("invalid streaming URL: {e}")))
    }
}

#[async_trait]
impl VoiceProvider for DeepgramProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::TranscribeLive, Capability::TranscribeBatch])
    }

    #[instrument(skip(self, audio), fields(audio_size = audio.size_bytes(), format = ?audio.format()))]
    async fn transcribe(&self, audio: AudioData, language: &str) -> Result<Transcription, ProviderError> {
        let mut query = vec![
            ("model", self.config.model.clone()),
            ("language", language.to_string()),
            ("punctuate", "true".to_string()),
            ("utterances", "true".to_string()),
        ];
        if audio.format() == AudioFormat::Pcm {
            query.push(("encoding", self.config.encoding.clone()));
            query.push((
                "sample_rate",
                audio.sample_rate().unwrap_or(self.config.sample_rate).to_string(),
            ));
        }

        let response = self
            .client
            .post(self.listen_url())
            .query(&query)
            .header("Authorization", format!("Token {}", self.api_key()))
            .header("Content-Type", audio.mime_type())
            .body(audio.into_bytes())
            .send()
            .await?;
        let body: ListenResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to parse response: {e}")))?;

        let mut channel = body
            .results
            .channels
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Unavailable("No transcription results".to_string()))?;
        let language_detected = channel.detected_language.take();
        let best = channel
            .alternatives
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Unavailable("No alternatives in response".to_string()))?;

        debug!(text_len = best.transcript.len(), "Deepgram transcription complete");
        let transcription = Transcription::new(best.transcript.trim())
            .with_confidence(best.confidence)
            .with_words(best.words.into_iter().map(Word::into_span).collect());
        Ok(match language_detected {
            Some(lang) => transcription.with_language(lang),
            None => transcription,
        })
    }

    #[instrument(skip(self, audio), fields(format = ?audio.format()))]
    async fn transcribe_live(&self, audio: AudioStream, language: &str) -> Result<ProviderEventStream, ProviderError> {
        let (format, sample_rate, mut chunks) = audio.into_parts();
        let url = self.streaming_url(language, format, sample_rate)?;

        let mut request = url.as_str().into_client_request()?;
        let auth = HeaderValue::from_str(&format!("Token {}", self.api_key()))
            .map_err(|_| ProviderError::Auth("API key is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (socket, _response) = connect_async(request).await?;
        info!("Connected to Deepgram streaming endpoint");
        let (mut sink, mut source) = socket.split();

        Ok(Box::pin(async_stream::stream! {
            let mut log = SegmentLog::default();
            let mut audio_open = true;

            loop {
                let step = tokio::select! {
                    chunk = chunks.next(), if audio_open => Step::Chunk(chunk),
                    message = source.next() => Step::Server(message),
                };

                match step {
                    Step::Chunk(Some(chunk)) => {
                        if let Err(e) = sink.send(Message::Binary(chunk)).await {
                            yield Err(ProviderError::from(e));
                            return;
                        }
                    },
                    Step::Chunk(None) => {
                        audio_open = false;
                        debug!("Audio finished, asking Deepgram to flush");
                        if let Err(e) = sink.send(Message::Text(CLOSE_STREAM.into())).await {
                            yield Err(ProviderError::from(e));
                            return;
                        }
                    },
                    Step::Server(Some(Ok(Message::Text(text)))) => {
                        match serde_json::from_str::<StreamMessage>(text.as_str()) {
                            Ok(StreamMessage::Results { channel, is_final }) => {
                                let Some(best) = channel.alternatives.into_iter().next() else {
                                    continue;
                                };
                                if is_final {
                                    log.push(best);
                                } else if !best.transcript.trim().is_empty() {
                                    yield Ok(LiveEvent::Partial {
                                        text: best.transcript.trim().to_string(),
                                        words: best.words.into_iter().map(Word::into_span).collect(),
                                    });
                                }
                            },
                            Ok(StreamMessage::Metadata {}) => {
                                yield Ok(LiveEvent::Final(log.finish()));
                                return;
                            },
                            Ok(StreamMessage::Other) => {},
                            Err(e) => {
                                warn!(error = %e, "Unparseable Deepgram message");
                                yield Err(ProviderError::Unavailable(format!("invalid stream message: {e}")));
                                return;
                            },
                        }
                    },
                    Step::Server(Some(Ok(Message::Close(frame)))) => {
                        match frame {
                            Some(frame) if frame.code != CloseCode::Normal => {
                                yield Err(ProviderError::Unavailable(format!(
                                    "stream closed with code {}: {}",
                                    u16::from(frame.code),
                                    frame.reason.as_str()
                                )));
                            },
                            _ => {
                                yield Ok(LiveEvent::Final(log.finish()));
                            },
                        }
                        return;
                    },
                    Step::Server(Some(Ok(_))) => {},
                    Step::Server(Some(Err(e))) => {
                        yield Err(ProviderError::from(e));
                        return;
                    },
                    Step::Server(None) => {
                        yield Ok(LiveEvent::Final(log.finish()));
                        return;
                    },
                }
            }
        }))
    }
}
