//! Infrastructure error types

use speech_dispatch::SpeechError;
use thiserror::Error;

/// Errors raised while configuring or wiring the voice stack
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// Configuration could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Loaded configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The voice stack rejected the configuration
    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Secret store lookup failed
    #[error("Secret store error: {0}")]
    Secret(String),

    /// Tracing subscriber could not be installed
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}
