//! Per-provider circuit breaker
//!
//! Closed until `failure_threshold` consecutive failures, then open for the
//! cooldown. After the cooldown a single trial call is admitted (half-open):
//! success closes the breaker, failure re-opens it for another cooldown.

use crate::config::BreakerConfig;
use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

pub struct ProviderHealth {
    breakers: DashMap<String, Breaker>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::from_config(&BreakerConfig::default())
    }
}

impl ProviderHealth {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.cooldown_secs))
    }

    /// Ask to send a call to `provider`.
    ///
    /// `Err` carries the remaining cooldown while the breaker is open (or
    /// while a half-open trial is already in flight).
    pub fn admit(&self, provider: &str) -> Result<(), Duration> {
        let mut breaker = self.breakers.entry(provider.to_string()).or_default();
        match breaker.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or(self.cooldown);
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                info!(provider, "circuit half-open, admitting trial call");
                breaker.state = CircuitState::HalfOpen;
                breaker.trial_in_flight = true;
                Ok(())
            }
            CircuitState::HalfOpen => {
                if breaker.trial_in_flight {
                    Err(Duration::ZERO)
                } else {
                    breaker.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let mut breaker = self.breakers.entry(provider.to_string()).or_default();
        if breaker.state != CircuitState::Closed {
            info!(provider, "circuit closed");
        }
        *breaker = Breaker::default();
    }

    pub fn record_failure(&self, provider: &str) {
        let mut breaker = self.breakers.entry(provider.to_string()).or_default();
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);
        breaker.trial_in_flight = false;

        let trip = match breaker.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => breaker.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            warn!(
                provider,
                failures = breaker.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "circuit opened"
            );
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    /// Give back a half-open trial slot that was never used (the call was
    /// cancelled before it could succeed or fail).
    pub fn abandon(&self, provider: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(provider) {
            breaker.trial_in_flight = false;
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.breakers
            .get(provider)
            .map(|b| b.state)
            .unwrap_or(CircuitState::Closed)
    }
}
