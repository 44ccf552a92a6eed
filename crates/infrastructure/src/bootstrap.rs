//! Wiring from configuration to a running voice service

use std::sync::Arc;

use speech_dispatch::{ProviderCatalog, ProviderRegistry, RegistryBuilder, VoiceService};
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::error::InfrastructureError;

/// Build the provider registry from configured vendors
///
/// Vendors without credentials are left out of the registry. Startup only
/// fails when a required capability ends up with no provider at all.
#[instrument(skip(config), fields(environment = %config.environment))]
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry, InfrastructureError> {
    let missing = config.vendors_missing_credentials();
    if !missing.is_empty() {
        warn!(vendors = ?missing, "Vendor sections without credentials will not be registered");
    }

    let speech = &config.speech;
    let mut builder = RegistryBuilder::new(speech.preset_table()?)
        .require_all(speech.dispatch.required_capabilities.iter().copied());
    for adapter in ProviderCatalog::from_config(&speech.providers)? {
        builder = builder.register(adapter);
    }

    let registry = builder.build()?;
    info!(providers = registry.len(), "Provider registry ready");
    Ok(registry)
}

/// Build the voice service described by `config`
///
/// Credentials must already be resolved, see
/// [`AppConfig::resolve_credentials`](crate::AppConfig::resolve_credentials).
pub fn build_voice_service(config: &AppConfig) -> Result<VoiceService, InfrastructureError> {
    let registry = build_registry(config)?;
    Ok(VoiceService::new(Arc::new(registry), &config.speech)?)
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use speech_dispatch::{AzureConfig, Capability, DeepgramConfig, ElevenLabsConfig, SpeechError};

    use super::*;
    use crate::config::Environment;

    fn voice_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.speech.providers.elevenlabs = Some(ElevenLabsConfig {
            api_key: Some(SecretString::from("xi-test")),
            ..ElevenLabsConfig::default()
        });
        config.speech.providers.deepgram = Some(DeepgramConfig {
            api_key: Some(SecretString::from("dg-test")),
            ..DeepgramConfig::default()
        });
        config
    }

    #[tokio::test]
    async fn configured_vendors_are_registered() {
        let service = build_voice_service(&voice_config()).unwrap();
        let registry = service.registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.providers_with(Capability::Synthesize).count(), 1);
        assert_eq!(registry.providers_with(Capability::TranscribeLive).count(), 1);
    }

    #[test]
    fn no_vendors_fails_required_capabilities() {
        let err = build_registry(&AppConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            InfrastructureError::Speech(SpeechError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn keyless_vendor_is_excluded_in_production() {
        let mut config = voice_config();
        config.environment = Environment::Production;
        config.speech.providers.azure = Some(AzureConfig::default());
        assert_eq!(config.vendors_missing_credentials(), vec!["azure"]);

        let registry = build_registry(&config).unwrap();
        let ids: Vec<&str> = registry.providers().iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["elevenlabs", "deepgram"]);
    }

    #[test]
    fn keyless_vendor_does_not_cover_required_capability() {
        let mut config = voice_config();
        config.environment = Environment::Production;
        config.speech.providers.elevenlabs = Some(ElevenLabsConfig::default());

        let err = build_registry(&config).unwrap_err();
        assert!(matches!(
            err,
            InfrastructureError::Speech(SpeechError::Configuration(_))
        ));
    }
}
