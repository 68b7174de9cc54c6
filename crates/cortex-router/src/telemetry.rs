//! Routing telemetry
//!
//! Counters live in a `DashMap` keyed by provider id. Recording is a
//! synchronous shard update, so the response path never awaits it.

use crate::registry::ModelEntry;
use cortex_llm::Usage;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderStats {
    pub successes: u64,
    pub failures: u64,
    /// Summed latency of successful calls.
    pub total_latency_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// `cost × tokens / 1000`, summed over calls that reported usage.
    pub cost_units: f64,
    pub last_error: Option<String>,
}

impl ProviderStats {
    pub fn mean_latency_ms(&self) -> Option<u64> {
        (self.successes > 0).then(|| self.total_latency_ms / self.successes)
    }
}

#[derive(Debug, Default)]
pub struct RouterTelemetry {
    stats: DashMap<String, ProviderStats>,
}

impl RouterTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, model: &ModelEntry, latency: Duration, usage: Option<&Usage>) {
        let mut stats = self.stats.entry(model.provider.clone()).or_default();
        stats.successes += 1;
        stats.total_latency_ms += latency.as_millis() as u64;
        if let Some(u) = usage {
            stats.input_tokens += u64::from(u.input_tokens);
            stats.output_tokens += u64::from(u.output_tokens);
            stats.cost_units += model.cost * f64::from(u.total()) / 1000.0;
        }
    }

    pub fn record_failure(&self, provider: &str, reason: impl Into<String>) {
        let mut stats = self.stats.entry(provider.to_string()).or_default();
        stats.failures += 1;
        stats.last_error = Some(reason.into());
    }

    pub fn provider(&self, provider: &str) -> Option<ProviderStats> {
        self.stats.get(provider).map(|s| s.clone())
    }

    /// Point-in-time copy of every provider's counters, sorted by id.
    pub fn snapshot(&self) -> BTreeMap<String, ProviderStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn reset(&self) {
        self.stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::Tier;

    #[test]
    fn accumulates_cost_and_latency() {
        let t = RouterTelemetry::new();
        let model = ModelEntry::new("m", "p", Tier::Fast, 1_000, 2.0);
        let usage = Usage { input_tokens: 400, output_tokens: 100 };
        t.record_success(&model, Duration::from_millis(30), Some(&usage));
        t.record_success(&model, Duration::from_millis(10), None);

        let s = t.provider("p").unwrap();
        assert_eq!(s.successes, 2);
        assert_eq!(s.mean_latency_ms(), Some(20));
        assert_eq!(s.input_tokens, 400);
        assert!((s.cost_units - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failures_keep_last_reason() {
        let t = RouterTelemetry::new();
        t.record_failure("p", "timeout");
        t.record_failure("p", "rate limited");
        let snap = t.snapshot();
        assert_eq!(snap["p"].failures, 2);
        assert_eq!(snap["p"].last_error.as_deref(), Some("rate limited"));
        assert_eq!(snap["p"].mean_latency_ms(), None);
    }
}
