//! Circuit breaker per payment provider
//!
//! One independent breaker per provider key. A run of consecutive transport
//! failures opens the circuit; while open, calls fail fast without touching
//! the provider. After the recovery timeout a single trial call is admitted;
//! its outcome decides between closing and reopening.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::metrics::CIRCUIT_STATE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast
    Open,
    /// Single trial call admitted
    HalfOpen,
}

impl CircuitState {
    fn as_gauge(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

/// Breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Seconds after the last failure before a trial call is admitted
    pub recovery_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_seconds: crate::DEFAULT_RECOVERY_SECONDS,
        }
    }
}

/// Per-provider breaker state machine
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false,
            config,
        }
    }

    /// Decide whether a call may proceed at `now`.
    ///
    /// While open, fails fast until the recovery timeout has elapsed since
    /// the last failure; then flips to half-open and admits exactly one
    /// trial call. Concurrent calls during the trial are rejected fast.
    pub fn try_acquire(&mut self, provider: &str, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_at
                    .map(|t| now.signed_duration_since(t).num_seconds().max(0) as u64)
                    .unwrap_or(u64::MAX);

                if elapsed >= self.config.recovery_timeout_seconds {
                    info!(provider, "circuit half-opening, admitting trial call");
                    self.state = CircuitState::HalfOpen;
                    self.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen {
                        provider: provider.to_string(),
                        reason: format!(
                            "cooling down, retry in {}s",
                            self.config.recovery_timeout_seconds - elapsed
                        ),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    Err(Error::CircuitOpen {
                        provider: provider.to_string(),
                        reason: "trial call in flight".to_string(),
                    })
                } else {
                    self.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call.
    pub fn on_success(&mut self, provider: &str) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                info!(provider, "trial succeeded, circuit closing");
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.trial_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call at `now`.
    pub fn on_failure(&mut self, provider: &str, now: DateTime<Utc>) {
        self.last_failure_at = Some(now);

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        provider,
                        failures = self.failure_count,
                        "circuit opening"
                    );
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider, "trial failed, circuit re-opening");
                self.state = CircuitState::Open;
                self.trial_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Force the breaker closed (operator intervention).
    pub fn reset(&mut self, provider: &str) {
        info!(provider, "circuit manually reset");
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_at = None;
        self.trial_in_flight = false;
    }
}

/// Registry of independent breakers keyed by provider name
pub struct CircuitBreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// Create a registry; breakers are created lazily per provider.
    pub fn new(default_config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(HashMap::new())),
            default_config,
            clock,
        }
    }

    /// Admit or reject a call for `provider`.
    pub async fn acquire(&self, provider: &str) -> Result<()> {
        let now = self.clock.now();
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(provider.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()));

        let decision = breaker.try_acquire(provider, now);
        CIRCUIT_STATE
            .with_label_values(&[provider])
            .set(breaker.state().as_gauge());
        decision
    }

    /// Record a successful call for `provider`.
    pub async fn record_success(&self, provider: &str) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(provider) {
            breaker.on_success(provider);
            CIRCUIT_STATE
                .with_label_values(&[provider])
                .set(breaker.state().as_gauge());
        }
    }

    /// Record a failed call for `provider`.
    pub async fn record_failure(&self, provider: &str) {
        let now = self.clock.now();
        let mut breakers = self.breakers.write().await;
        let breaker = breakers
            .entry(provider.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()));
        breaker.on_failure(provider, now);
        CIRCUIT_STATE
            .with_label_values(&[provider])
            .set(breaker.state().as_gauge());
    }

    /// Current state for `provider` (closed when unknown).
    pub async fn state(&self, provider: &str) -> CircuitState {
        let breakers = self.breakers.read().await;
        breakers
            .get(provider)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Force a provider's breaker closed.
    pub async fn reset(&self, provider: &str) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(provider) {
            breaker.reset(provider);
        }
    }
}
