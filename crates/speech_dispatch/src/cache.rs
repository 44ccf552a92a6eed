//! Phrase cache
//!
//! Content-addressed store of synthesized audio, keyed by a fingerprint of
//! the normalized text, voice profile and emotion sliders. Backed by Moka,
//! so reads never block on writes and eviction runs concurrently.
//!
//! Every entry carries a BLAKE3 checksum of its audio; an entry that fails
//! verification is discarded and reported as a miss.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::CacheConfig;
use crate::error::SpeechError;
use crate::types::{AudioData, EmotionParams, ProviderId};

/// Collapse runs of whitespace and trim, so trivially different spellings
/// of the same phrase share an entry
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Generate a cache key from components
///
/// Components are hashed with BLAKE3 and separated so that
/// `["ab", "c"]` and `["a", "bc"]` produce different keys.
#[must_use]
pub fn generate_cache_key(prefix: &str, components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update(b"|");
    }
    format!("{prefix}:{}", hasher.finalize().to_hex())
}

/// Fingerprint of a synthesis request
///
/// Sliders are keyed at two decimals, matching [`EmotionParams::quantized`].
/// Absent emotion and emotion with every slider unset produce the same key.
#[must_use]
pub fn fingerprint(text: &str, voice_profile: &str, emotion: Option<&EmotionParams>) -> String {
    let emotion = emotion.copied().unwrap_or_default();
    let slider = |v: Option<f32>| v.map_or_else(|| "_".to_string(), |v| format!("{v:.2}"));
    let emotion_component = format!(
        "{},{},{},{}",
        slider(emotion.stability),
        slider(emotion.similarity_boost),
        slider(emotion.style),
        slider(emotion.speed)
    );
    generate_cache_key(
        "tts",
        &[&normalize_text(text), voice_profile, &emotion_component],
    )
}

/// A cached synthesis result
#[derive(Debug)]
pub struct CachedPhrase {
    audio: AudioData,
    provider: ProviderId,
    created_at: DateTime<Utc>,
    hit_count: AtomicU64,
    checksum: blake3::Hash,
}

impl CachedPhrase {
    fn new(audio: AudioData, provider: ProviderId) -> Self {
        let checksum = blake3::hash(audio.data());
        Self {
            audio,
            provider,
            created_at: Utc::now(),
            hit_count: AtomicU64::new(0),
            checksum,
        }
    }

    /// Cached audio
    #[must_use]
    pub const fn audio(&self) -> &AudioData {
        &self.audio
    }

    /// Provider that originally produced the audio
    #[must_use]
    pub const fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// When the entry was stored
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of cache hits served from this entry
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    fn verify(&self) -> Result<(), SpeechError> {
        if self.audio.is_empty() {
            return Err(SpeechError::CacheCorruption("empty audio".to_string()));
        }
        if blake3::hash(self.audio.data()) != self.checksum {
            return Err(SpeechError::CacheCorruption("checksum mismatch".to_string()));
        }
        Ok(())
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PhraseCacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that fell through to a provider
    pub misses: u64,
    /// Entries discarded after failing verification
    pub corrupt_discarded: u64,
    /// Current number of entries
    pub entries: u64,
}

/// Shared phrase cache
pub struct PhraseCache {
    cache: Cache<String, Arc<CachedPhrase>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt: AtomicU64,
}

impl fmt::Debug for PhraseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhraseCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.cache.entry_count())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PhraseCache {
    /// Create a cache from configuration
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let max_capacity_bytes = config.max_capacity_mb.saturating_mul(1024 * 1024);

        let mut builder = Cache::builder()
            .max_capacity(max_capacity_bytes)
            .eviction_policy(EvictionPolicy::lru())
            .weigher(|key: &String, value: &Arc<CachedPhrase>| -> u32 {
                (key.len() + value.audio.size_bytes())
                    .try_into()
                    .unwrap_or(u32::MAX)
            });

        if let Some(ttl) = config.ttl_secs {
            builder = builder.time_to_live(Duration::from_secs(ttl));
        }

        Self {
            cache: builder.build(),
            enabled: config.enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            corrupt: AtomicU64::new(0),
        }
    }

    /// Whether caching is enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a phrase, counting the hit on the entry
    ///
    /// Corrupt entries are invalidated and reported as misses.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, key: &str) -> Option<Arc<CachedPhrase>> {
        if !self.enabled {
            return None;
        }
        match self.cache.get(key).await {
            Some(entry) => match entry.verify() {
                Ok(()) => {
                    entry.hit_count.fetch_add(1, Ordering::Relaxed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Phrase cache hit");
                    Some(entry)
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding corrupt cache entry");
                    self.cache.invalidate(key).await;
                    self.corrupt.fetch_add(1, Ordering::Relaxed);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                },
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Phrase cache miss");
                None
            },
        }
    }

    /// Store synthesized audio
    #[instrument(skip(self, audio), fields(size = audio.size_bytes()), level = "debug")]
    pub async fn insert(&self, key: String, audio: AudioData, provider: ProviderId) {
        if !self.enabled || audio.is_empty() {
            return;
        }
        self.cache
            .insert(key, Arc::new(CachedPhrase::new(audio, provider)))
            .await;
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("Phrase cache cleared");
    }

    /// Current counters
    pub async fn stats(&self) -> PhraseCacheStats {
        self.cache.run_pending_tasks().await;
        PhraseCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt_discarded: self.corrupt.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }

    #[cfg(test)]
    async fn insert_entry(&self, key: String, entry: CachedPhrase) {
        self.cache.insert(key, Arc::new(entry)).await;
    }
}
