//! Provider registry
//!
//! The closed set of adapters available to the dispatchers, assembled once
//! at startup. Building the registry fails fast on anything that would
//! otherwise surface as a per-call failure: duplicate ids, adapters with no
//! capabilities, presets that do not resolve for a synthesis provider, and
//! required capabilities nobody provides.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::SpeechError;
use crate::ports::VoiceProvider;
use crate::presets::PresetTable;
use crate::types::{Capability, CapabilitySet, ProviderId};

/// A registered adapter
#[derive(Clone)]
pub struct ProviderRecord {
    id: ProviderId,
    capabilities: CapabilitySet,
    adapter: Arc<dyn VoiceProvider>,
}

impl fmt::Debug for ProviderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl ProviderRecord {
    /// Provider id
    #[must_use]
    pub const fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Declared capabilities, captured at registration
    #[must_use]
    pub const fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Check a capability
    #[must_use]
    pub const fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// The adapter
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn VoiceProvider> {
        &self.adapter
    }
}

/// Builder for [`ProviderRegistry`]
#[derive(Debug)]
pub struct RegistryBuilder {
    presets: PresetTable,
    records: Vec<ProviderRecord>,
    required: CapabilitySet,
}

impl RegistryBuilder {
    /// Start a registry that resolves voices from `presets`
    #[must_use]
    pub const fn new(presets: PresetTable) -> Self {
        Self {
            presets,
            records: Vec::new(),
            required: CapabilitySet::empty(),
        }
    }

    /// Register an adapter; order of registration is the default fallback order
    #[must_use]
    pub fn register(mut self, adapter: Arc<dyn VoiceProvider>) -> Self {
        self.records.push(ProviderRecord {
            id: adapter.id().clone(),
            capabilities: adapter.capabilities(),
            adapter,
        });
        self
    }

    /// Require at least one provider with this capability
    #[must_use]
    pub const fn require(mut self, capability: Capability) -> Self {
        self.required = self.required.with(capability);
        self
    }

    /// Require every capability in the iterator
    #[must_use]
    pub fn require_all(self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        capabilities.into_iter().fold(self, Self::require)
    }

    /// Validate and freeze the registry
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if any startup invariant is violated.
    pub fn build(self) -> Result<ProviderRegistry, SpeechError> {
        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert(record.id.clone()) {
                return Err(SpeechError::Configuration(format!(
                    "provider '{}' registered twice",
                    record.id
                )));
            }
            if record.capabilities.is_empty() {
                return Err(SpeechError::Configuration(format!(
                    "provider '{}' declares no capabilities",
                    record.id
                )));
            }
        }

        self.presets.ensure_total(
            self.records
                .iter()
                .filter(|r| r.supports(Capability::Synthesize))
                .map(|r| &r.id),
        )?;

        for capability in self.required.iter() {
            if !self.records.iter().any(|r| r.supports(capability)) {
                return Err(SpeechError::Configuration(format!(
                    "no registered provider supports required capability {capability}"
                )));
            }
        }

        for record in &self.records {
            info!(
                provider = %record.id,
                capabilities = %record.capabilities,
                "Registered voice provider"
            );
        }

        Ok(ProviderRegistry {
            records: self.records,
            presets: self.presets,
        })
    }
}

/// Immutable set of registered providers
#[derive(Debug)]
pub struct ProviderRegistry {
    records: Vec<ProviderRecord>,
    presets: PresetTable,
}

impl ProviderRegistry {
    /// Look up a provider
    #[must_use]
    pub fn get(&self, id: &ProviderId) -> Option<&ProviderRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// All providers, in registration order
    #[must_use]
    pub fn providers(&self) -> &[ProviderRecord] {
        &self.records
    }

    /// Providers with a capability, in registration order
    pub fn providers_with(&self, capability: Capability) -> impl Iterator<Item = &ProviderRecord> {
        self.records.iter().filter(move |r| r.supports(capability))
    }

    /// Check that a provider exists and has a capability
    #[must_use]
    pub fn supports(&self, id: &ProviderId, capability: Capability) -> bool {
        self.get(id).is_some_and(|r| r.supports(capability))
    }

    /// Voice presets the registry was validated against
    #[must_use]
    pub const fn presets(&self) -> &PresetTable {
        &self.presets
    }

    /// Number of providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
