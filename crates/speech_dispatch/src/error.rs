//! Voice dispatch errors
//!
//! Two layers: [`ProviderError`] is what a single adapter call can fail
//! with, [`SpeechError`] is what a dispatcher returns to its caller.

use std::fmt::Write as _;

use thiserror::Error;

use crate::types::{Capability, ProviderId};

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Credentials rejected or missing; needs an operator, not a retry
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Vendor quota or rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// No response within the attempt deadline
    #[error("Request timed out")]
    Timeout,

    /// Any other vendor or transport failure
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {status}: {}", truncate(body, 200));
        match status {
            401 | 403 => Self::Auth(detail),
            429 => Self::RateLimited(detail),
            408 | 504 => Self::Timeout,
            _ => Self::Unavailable(detail),
        }
    }

    /// Whether this failure points at misconfiguration rather than
    /// transient degradation
    #[must_use]
    pub const fn requires_operator_attention(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Short machine-readable kind, used as a log field
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::RateLimited(_) => "rate_limited",
            Self::Timeout => "timeout",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ProviderError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Http(response) => Self::from_status(response.status().as_u16(), "handshake rejected"),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One failed provider attempt within a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// Provider that was tried
    pub provider: ProviderId,
    /// How it failed
    pub error: ProviderError,
    /// Time spent on the attempt
    pub elapsed_ms: u64,
}

/// Errors returned by the dispatchers
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Rejected before any provider was called
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every eligible provider failed or was skipped
    #[error(
        "All providers failed for {capability}: {}",
        describe_failures(.attempts, .skipped)
    )]
    AllProvidersFailed {
        /// Capability that was requested
        capability: Capability,
        /// Attempts made, in order
        attempts: Vec<FailedAttempt>,
        /// Providers skipped because their circuit was open
        skipped: Vec<ProviderId>,
    },

    /// A committed live stream failed after delivering results
    #[error("Provider {provider} failed mid-stream: {source}")]
    Provider {
        /// Provider serving the stream
        provider: ProviderId,
        /// Underlying failure
        #[source]
        source: ProviderError,
    },

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration or registry
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A cached phrase failed its integrity check
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),
}

impl SpeechError {
    /// Whether any attempt behind this error was an auth failure
    #[must_use]
    pub fn involves_auth_failure(&self) -> bool {
        match self {
            Self::AllProvidersFailed { attempts, .. } => attempts
                .iter()
                .any(|a| a.error.requires_operator_attention()),
            Self::Provider { source, .. } => source.requires_operator_attention(),
            _ => false,
        }
    }
}

fn describe_failures(attempts: &[FailedAttempt], skipped: &[ProviderId]) -> String {
    if attempts.is_empty() && skipped.is_empty() {
        return "no eligible providers".to_string();
    }
    let mut out = String::new();
    for (i, attempt) in attempts.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{}: {}", attempt.provider, attempt.error);
    }
    if !skipped.is_empty() {
        if !out.is_empty() {
            out.push_str("; ");
        }
        let names: Vec<&str> = skipped.iter().map(ProviderId::as_str).collect();
        let _ = write!(out, "circuit open: {}", names.join(", "));
    }
    out
}
