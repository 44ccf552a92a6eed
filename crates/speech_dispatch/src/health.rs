//! Provider health tracking
//!
//! One circuit breaker per (provider, capability) pair, shared by every
//! request in the process.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: the dispatcher skips the provider until the cool-down elapses
//! - **Half-Open**: exactly one trial call is admitted; its outcome closes
//!   or re-opens the circuit
//!
//! Callers obtain a [`CallPermit`] before invoking an adapter and settle it
//! with the outcome. A trial permit dropped without being settled (the
//! request was cancelled) frees the trial slot without counting a failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::HealthConfig;
use crate::error::ProviderError;
use crate::registry::ProviderRegistry;
use crate::types::{Capability, ProviderId};

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Provider is skipped
    Open,
    /// One trial call allowed
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    /// Provider
    pub provider: ProviderId,
    /// Capability the breaker guards
    pub capability: Capability,
    /// Current state
    pub state: CircuitState,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// When the circuit last opened
    pub opened_at: Option<DateTime<Utc>>,
    /// Authentication failures seen over the process lifetime
    pub auth_failures: u64,
    /// The most recent failure was an authentication failure
    pub needs_attention: bool,
    /// Most recent failure message
    pub last_error: Option<String>,
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    auth_failures: u64,
    needs_attention: bool,
    last_error: Option<String>,
}

/// Circuit breaker for one provider capability
pub struct CircuitBreaker {
    provider: ProviderId,
    capability: Capability,
    config: HealthConfig,
    state: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("provider", &self.provider)
            .field("capability", &self.capability)
            .field("state", &self.state.lock().state)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker
    #[must_use]
    pub fn new(provider: ProviderId, capability: Capability, config: HealthConfig) -> Self {
        Self {
            provider,
            capability,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                opened_at_wall: None,
                trial_in_flight: false,
                auth_failures: 0,
                needs_attention: false,
                last_error: None,
            }),
        }
    }

    /// Current state, moving Open to Half-Open once the cool-down has elapsed
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.state
    }

    fn refresh(&self, state: &mut BreakerState) {
        if state.state == CircuitState::Open {
            let cooled = state
                .opened_at
                .is_none_or(|at| at.elapsed() >= self.config.cooldown());
            if cooled {
                state.state = CircuitState::HalfOpen;
                state.trial_in_flight = false;
                info!(
                    provider = %self.provider,
                    capability = %self.capability,
                    "Circuit breaker transitioning to half-open"
                );
            }
        }
    }

    /// Ask to call the provider
    ///
    /// Returns `None` while the circuit is open, or half-open with the
    /// trial call already in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CallPermit> {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        let trial = match state.state {
            CircuitState::Closed => false,
            CircuitState::Open => return None,
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    return None;
                }
                state.trial_in_flight = true;
                true
            },
        };
        Some(CallPermit {
            breaker: Arc::clone(self),
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut state = self.state.lock();
        state.needs_attention = false;
        match state.state {
            CircuitState::HalfOpen if trial => {
                info!(
                    provider = %self.provider,
                    capability = %self.capability,
                    "Trial call succeeded, circuit breaker closed"
                );
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.opened_at = None;
                state.opened_at_wall = None;
                state.trial_in_flight = false;
            },
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            },
            // A call admitted before the circuit opened; the trial decides recovery
            CircuitState::Open | CircuitState::HalfOpen => {},
        }
    }

    fn on_failure(&self, err: &ProviderError, trial: bool) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_error = Some(err.to_string());
        state.needs_attention = err.requires_operator_attention();

        if err.requires_operator_attention() {
            state.auth_failures = state.auth_failures.saturating_add(1);
            error!(
                provider = %self.provider,
                capability = %self.capability,
                error = %err,
                "Provider rejected credentials, operator attention required"
            );
        }

        match state.state {
            CircuitState::Closed if state.consecutive_failures >= self.config.failure_threshold => {
                warn!(
                    provider = %self.provider,
                    capability = %self.capability,
                    failures = state.consecutive_failures,
                    cooldown_ms = self.config.cooldown_ms,
                    "Circuit breaker opened"
                );
                Self::open(&mut state);
            },
            CircuitState::HalfOpen if trial => {
                warn!(
                    provider = %self.provider,
                    capability = %self.capability,
                    error = %err,
                    "Trial call failed, circuit breaker re-opened"
                );
                Self::open(&mut state);
            },
            _ => {},
        }
    }

    fn open(state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        state.opened_at_wall = Some(Utc::now());
        state.trial_in_flight = false;
    }

    fn release_trial(&self) {
        let mut state = self.state.lock();
        if state.state == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    /// Snapshot for reporting
    #[must_use]
    pub fn snapshot(&self) -> ProviderHealth {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        ProviderHealth {
            provider: self.provider.clone(),
            capability: self.capability,
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at_wall,
            auth_failures: state.auth_failures,
            needs_attention: state.needs_attention,
            last_error: state.last_error.clone(),
        }
    }
}

/// Permission to make one provider call
///
/// Settle with [`CallPermit::succeed`] or [`CallPermit::fail`].
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this permit is the half-open trial
    #[must_use]
    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    /// Record a successful call
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// Record a failed call
    pub fn fail(mut self, err: &ProviderError) {
        self.settled = true;
        self.breaker.on_failure(err, self.trial);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

/// Health state for every registered (provider, capability) pair
#[derive(Debug)]
pub struct HealthTracker {
    breakers: HashMap<(ProviderId, Capability), Arc<CircuitBreaker>>,
}

impl HealthTracker {
    /// Create closed breakers for every capability of every registered provider
    #[must_use]
    pub fn new(registry: &ProviderRegistry, config: HealthConfig) -> Self {
        let breakers = registry
            .providers()
            .iter()
            .flat_map(|record| {
                record.capabilities().iter().map(move |cap| {
                    (
                        (record.id().clone(), cap),
                        Arc::new(CircuitBreaker::new(record.id().clone(), cap, config)),
                    )
                })
            })
            .collect();
        Self { breakers }
    }

    /// Ask to call a provider for a capability; `None` means skip it
    #[must_use]
    pub fn try_acquire(&self, provider: &ProviderId, capability: Capability) -> Option<CallPermit> {
        self.breaker(provider, capability)
            .and_then(CircuitBreaker::try_acquire)
    }

    /// Current circuit state
    #[must_use]
    pub fn state(&self, provider: &ProviderId, capability: Capability) -> Option<CircuitState> {
        self.breaker(provider, capability).map(|b| b.state())
    }

    /// Snapshot of one breaker
    #[must_use]
    pub fn snapshot(&self, provider: &ProviderId, capability: Capability) -> Option<ProviderHealth> {
        self.breaker(provider, capability).map(|b| b.snapshot())
    }

    /// Snapshots of every breaker, sorted by provider then capability
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProviderHealth> {
        let mut all: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        all.sort_by(|a, b| {
            a.provider
                .cmp(&b.provider)
                .then(a.capability.cmp(&b.capability))
        });
        all
    }

    /// Providers whose latest failure was an authentication failure
    #[must_use]
    pub fn needs_attention(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self
            .snapshots()
            .into_iter()
            .filter(|h| h.needs_attention)
            .map(|h| h.provider)
            .collect();
        ids.dedup();
        ids
    }

    fn breaker(&self, provider: &ProviderId, capability: Capability) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.get(&(provider.clone(), capability))
    }
}
