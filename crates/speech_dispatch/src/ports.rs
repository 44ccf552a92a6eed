//! Port definitions for voice providers
//!
//! Defines the trait every vendor adapter implements. Adapters translate
//! the uniform shapes in [`crate::types`] to and from one vendor protocol;
//! they never cache, retry, or fall back on their own.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ProviderError;
use crate::presets::VoiceParams;
use crate::types::{AudioData, AudioStream, Capability, CapabilitySet, ProviderId, Transcription, WordSpan};

/// Event produced by a provider on a live transcription stream
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Interim hypothesis
    Partial {
        /// Text recognized so far in the current segment
        text: String,
        /// Word spans recognized so far in the current segment
        words: Vec<WordSpan>,
    },
    /// Completed transcript; the provider sends nothing after this
    Final(Transcription),
}

/// Stream of live events from one provider
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = Result<LiveEvent, ProviderError>> + Send>>;

/// Port for vendor speech integrations
///
/// Every call is a billable external request, so dispatchers invoke
/// adapters one at a time and only when the result will be used.
///
/// Capability methods default to `ProviderError::Unavailable`; an adapter
/// overrides exactly the ones it lists in [`VoiceProvider::capabilities`].
///
/// # Example
///
/// ```ignore
/// use speech_dispatch::{VoiceProvider, VoiceParams};
///
/// async fn say(provider: &dyn VoiceProvider, params: &VoiceParams) -> Result<usize, ProviderError> {
///     let audio = provider.synthesize("Thanks for calling!", params).await?;
///     Ok(audio.size_bytes())
/// }
/// ```
#[async_trait]
pub trait VoiceProvider: Send + Sync + fmt::Debug {
    /// Stable identifier used in configuration and provenance
    fn id(&self) -> &ProviderId;

    /// Capabilities this adapter implements
    fn capabilities(&self) -> CapabilitySet;

    /// Convert text to speech
    ///
    /// # Arguments
    ///
    /// * `text` - Normalized, non-empty text to speak
    /// * `params` - Voice and sliders resolved from a preset
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the vendor call fails.
    async fn synthesize(&self, _text: &str, _params: &VoiceParams) -> Result<AudioData, ProviderError> {
        Err(unsupported(self.id(), Capability::Synthesize))
    }

    /// Transcribe a complete recording
    ///
    /// # Arguments
    ///
    /// * `audio` - Non-empty audio buffer
    /// * `language` - Language tag such as "en" or "en-US"
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the vendor call fails.
    async fn transcribe(&self, _audio: AudioData, _language: &str) -> Result<Transcription, ProviderError> {
        Err(unsupported(self.id(), Capability::TranscribeBatch))
    }

    /// Open a streaming transcription session
    ///
    /// Resolves once the session is established. The returned stream
    /// yields partial events and ends after one `Final` event.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the session cannot be established.
    async fn transcribe_live(
        &self,
        _audio: AudioStream,
        _language: &str,
    ) -> Result<ProviderEventStream, ProviderError> {
        Err(unsupported(self.id(), Capability::TranscribeLive))
    }
}

fn unsupported(id: &ProviderId, capability: Capability) -> ProviderError {
    ProviderError::Unavailable(format!("{id} does not support {capability}"))
}
