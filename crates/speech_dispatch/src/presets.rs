//! Voice presets
//!
//! Callers ask for a tone ("warm", "professional", "empathetic"); this
//! module turns that into the concrete voice id and slider values a given
//! provider understands. Resolution is a pure table lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::types::{EmotionParams, ProviderId};

/// Concrete synthesis parameters for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Vendor voice identifier
    pub voice_id: String,
    /// Voice stability (0.0 - 1.0)
    pub stability: f32,
    /// Similarity boost (0.0 - 1.0)
    pub similarity_boost: f32,
    /// Style exaggeration (0.0 - 1.0)
    pub style: f32,
    /// Speaking rate multiplier
    pub speed: f32,
}

/// A semantic tone and the voices that realize it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDefinition {
    /// Voice stability
    #[serde(default = "default_stability")]
    pub stability: f32,
    /// Similarity boost
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    /// Style exaggeration
    #[serde(default)]
    pub style: f32,
    /// Speaking rate multiplier
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Voice id per provider
    #[serde(default)]
    pub voices: BTreeMap<ProviderId, String>,
}

const fn default_stability() -> f32 {
    0.5
}

const fn default_similarity_boost() -> f32 {
    0.75
}

const fn default_speed() -> f32 {
    1.0
}

impl PresetDefinition {
    /// Create a preset with the given sliders and no voices
    #[must_use]
    pub const fn new(stability: f32, similarity_boost: f32, style: f32) -> Self {
        Self {
            stability,
            similarity_boost,
            style,
            speed: 1.0,
            voices: BTreeMap::new(),
        }
    }

    /// Set the speaking rate
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Map a provider to one of its voices
    #[must_use]
    pub fn with_voice(mut self, provider: impl Into<ProviderId>, voice_id: impl Into<String>) -> Self {
        self.voices.insert(provider.into(), voice_id.into());
        self
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        EmotionParams {
            stability: Some(self.stability),
            similarity_boost: Some(self.similarity_boost),
            style: Some(self.style),
            speed: Some(self.speed),
        }
        .validate()
        .map_err(|e| format!("preset '{name}': {e}"))
    }
}

/// Table of named presets
#[derive(Debug, Clone, PartialEq)]
pub struct PresetTable {
    presets: BTreeMap<String, PresetDefinition>,
}

impl PresetTable {
    /// Presets shipped with the service
    ///
    /// Voice ids cover the ElevenLabs, Azure and OpenAI adapters.
    #[must_use]
    pub fn builtin() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(
            "warm".to_string(),
            PresetDefinition::new(0.5, 0.75, 0.3)
                .with_voice("elevenlabs", "21m00Tcm4TlvDq8ikWAM")
                .with_voice("azure", "en-US-JennyNeural")
                .with_voice("openai", "nova"),
        );
        presets.insert(
            "professional".to_string(),
            PresetDefinition::new(0.7, 0.75, 0.1)
                .with_voice("elevenlabs", "pNInz6obpgDQGcFmaJgB")
                .with_voice("azure", "en-US-GuyNeural")
                .with_voice("openai", "onyx"),
        );
        presets.insert(
            "empathetic".to_string(),
            PresetDefinition::new(0.4, 0.8, 0.5)
                .with_speed(0.95)
                .with_voice("elevenlabs", "EXAVITQu4vr4xnSDxMaL")
                .with_voice("azure", "en-US-AriaNeural")
                .with_voice("openai", "shimmer"),
        );
        Self { presets }
    }

    /// Build a table from explicit definitions
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the table is empty or a
    /// preset carries out-of-range sliders.
    pub fn from_definitions(
        presets: BTreeMap<String, PresetDefinition>,
    ) -> Result<Self, SpeechError> {
        if presets.is_empty() {
            return Err(SpeechError::Configuration(
                "at least one voice preset is required".to_string(),
            ));
        }
        for (name, preset) in &presets {
            preset.validate(name).map_err(SpeechError::Configuration)?;
        }
        Ok(Self { presets })
    }

    /// Preset names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Look up a preset definition
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PresetDefinition> {
        self.presets.get(name)
    }

    /// Check whether a profile is declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Verify that every preset resolves for every given provider
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` naming the first missing
    /// (preset, provider) pair.
    pub fn ensure_total<'a>(
        &self,
        providers: impl IntoIterator<Item = &'a ProviderId>,
    ) -> Result<(), SpeechError> {
        for provider in providers {
            for (name, preset) in &self.presets {
                if !preset.voices.contains_key(provider) {
                    return Err(SpeechError::Configuration(format!(
                        "voice preset '{name}' has no voice for provider '{provider}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve a profile for a provider, applying emotion overrides
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::InvalidInput` for an unknown profile and
    /// `SpeechError::Configuration` if the provider has no voice for it.
    pub fn resolve(
        &self,
        profile: &str,
        provider: &ProviderId,
        emotion: Option<&EmotionParams>,
    ) -> Result<VoiceParams, SpeechError> {
        let preset = self
            .presets
            .get(profile)
            .ok_or_else(|| SpeechError::InvalidInput(format!("Unknown voice profile: {profile}")))?;
        let voice_id = preset.voices.get(provider).ok_or_else(|| {
            SpeechError::Configuration(format!(
                "voice preset '{profile}' has no voice for provider '{provider}'"
            ))
        })?;

        let emotion = emotion.copied().unwrap_or_default();
        Ok(VoiceParams {
            voice_id: voice_id.clone(),
            stability: emotion.stability.unwrap_or(preset.stability),
            similarity_boost: emotion.similarity_boost.unwrap_or(preset.similarity_boost),
            style: emotion.style.unwrap_or(preset.style),
            speed: emotion.speed.unwrap_or(preset.speed),
        })
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::builtin()
    }
}
