//! Infrastructure layer - configuration, credentials, logging and wiring
//!
//! Turns a `config.toml` plus environment into a running
//! [`speech_dispatch::VoiceService`]:
//! - [`AppConfig`] loads layered configuration
//! - [`EnvSecretStore`] supplies vendor credentials
//! - [`init_logging`] installs the tracing subscriber
//! - [`build_voice_service`] registers the configured vendors

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod secrets;
pub mod telemetry;

pub use bootstrap::{build_registry, build_voice_service};
pub use config::{AppConfig, Environment};
pub use error::InfrastructureError;
pub use secrets::{EnvSecretStore, SecretStore};
pub use telemetry::{LogFormat, LoggingConfig, init_logging};
