//! Dispatchers
//!
//! Synthesis and transcription share the same skeleton: build an ordered
//! candidate list, skip providers whose circuit is open, run one attempt at
//! a time under a per-attempt deadline and an overall budget, and stop as
//! soon as the caller's cancellation token fires.

mod live_feed;
pub mod synthesis;
pub mod transcription;

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ProviderError, SpeechError};
use crate::registry::ProviderRegistry;
use crate::types::{Capability, ProviderId};

pub use synthesis::SynthesisDispatcher;
pub use transcription::{TranscriptStream, TranscriptionDispatcher};

/// Outcome of one bounded provider attempt
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    Succeeded(T),
    Failed(ProviderError),
    Cancelled,
}

/// Run one adapter call under a deadline, abandoning it on cancellation
///
/// Dropping the adapter future aborts its in-flight request.
pub(crate) async fn run_attempt<T, F>(fut: F, deadline: Duration, cancel: &CancellationToken) -> Attempt<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;

        () = cancel.cancelled() => Attempt::Cancelled,
        result = tokio::time::timeout(deadline, fut) => match result {
            Ok(Ok(value)) => Attempt::Succeeded(value),
            Ok(Err(err)) => Attempt::Failed(err),
            Err(_) => Attempt::Failed(ProviderError::Timeout),
        },
    }
}

/// Wall-clock budget for a whole request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    deadline: Instant,
}

impl Budget {
    pub(crate) fn new(total: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
        }
    }

    /// Deadline for the next attempt, or `None` once the budget is spent
    pub(crate) fn next_attempt(&self, per_attempt: Duration) -> Option<Duration> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(per_attempt.min(remaining))
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Turn a configured order into the default candidate list for a capability
///
/// Unknown or incapable ids are dropped with a warning; capable providers
/// missing from the list are appended in registration order.
pub(crate) fn resolve_order(
    registry: &ProviderRegistry,
    configured: &[ProviderId],
    capability: Capability,
) -> Vec<ProviderId> {
    let mut order: Vec<ProviderId> = Vec::new();
    for id in configured {
        if order.contains(id) {
            continue;
        }
        match registry.get(id) {
            Some(record) if record.supports(capability) => order.push(id.clone()),
            Some(_) => warn!(
                provider = %id,
                capability = %capability,
                "Ignoring provider in fallback order: capability not supported"
            ),
            None => warn!(
                provider = %id,
                capability = %capability,
                "Ignoring provider in fallback order: not registered"
            ),
        }
    }
    for record in registry.providers_with(capability) {
        if !order.contains(record.id()) {
            order.push(record.id().clone());
        }
    }
    order
}

/// Candidate list for one request: the override first, then the defaults
pub(crate) fn candidates(
    registry: &ProviderRegistry,
    default_order: &[ProviderId],
    capability: Capability,
    provider_override: Option<&ProviderId>,
) -> Result<Vec<ProviderId>, SpeechError> {
    let Some(preferred) = provider_override else {
        return Ok(default_order.to_vec());
    };
    if !registry.supports(preferred, capability) {
        return Err(SpeechError::InvalidInput(format!(
            "Provider '{preferred}' is not registered for {capability}"
        )));
    }
    let mut list = Vec::with_capacity(default_order.len() + 1);
    list.push(preferred.clone());
    list.extend(default_order.iter().filter(|id| *id != preferred).cloned());
    Ok(list)
}
