//! Model router: ordered fallback across tiers and providers
//!
//! A routing attempt walks the resolved candidate list once. Every candidate
//! gets at most one call; a provider found down is remembered for the rest
//! of the attempt so it is neither re-checked nor reported twice.

use crate::config::RouterConfig;
use crate::health::ProviderHealth;
use crate::registry::{ModelEntry, ModelRegistry};
use crate::telemetry::RouterTelemetry;
use cortex_core::Tier;
use cortex_llm::{Completion, LlmError, LlmProvider, LlmRequest};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to route: a pinned model, a tier, or both.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub model: Option<String>,
    pub tier: Option<Tier>,
    pub request: LlmRequest,
}

impl RouteRequest {
    pub fn tier(tier: Tier, request: LlmRequest) -> Self {
        Self { model: None, tier: Some(tier), request }
    }

    pub fn model(model: impl Into<String>, request: LlmRequest) -> Self {
        Self { model: Some(model.into()), tier: None, request }
    }
}

/// How the serving model's tier relates to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Substitution {
    None,
    Escalated,
    Downgraded,
}

impl Substitution {
    fn between(requested: Tier, served: Tier) -> Self {
        match served.cmp(&requested) {
            std::cmp::Ordering::Equal => Substitution::None,
            std::cmp::Ordering::Greater => Substitution::Escalated,
            std::cmp::Ordering::Less => Substitution::Downgraded,
        }
    }
}

/// Why one candidate was skipped or failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// No adapter registered under the model's provider id.
    NotConfigured,
    CircuitOpen { retry_in_ms: u64 },
    Unavailable { message: String },
    Timeout { after_ms: u64 },
    Provider { message: String },
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::NotConfigured => f.write_str("provider not configured"),
            AttemptFailure::CircuitOpen { retry_in_ms } => write!(f, "circuit open (retry in {}ms)", retry_in_ms),
            AttemptFailure::Unavailable { message } => write!(f, "unavailable: {}", message),
            AttemptFailure::Timeout { after_ms } => write!(f, "timed out after {}ms", after_ms),
            AttemptFailure::Provider { message } => write!(f, "provider error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub provider: String,
    pub model: String,
    pub reason: AttemptFailure,
}

fn summarize(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}/{}: {}", a.provider, a.model, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no provider available ({})", summarize(.attempts))]
    NoProviderAvailable { attempts: Vec<Attempt> },

    #[error("no candidate models for request")]
    EmptyCandidates,

    #[error("routing cancelled")]
    Cancelled,
}

/// A completion plus where it came from.
#[derive(Debug, Clone)]
pub struct RoutedCompletion {
    pub completion: Completion,
    pub model: ModelEntry,
    pub requested_tier: Tier,
    pub substitution: Substitution,
    pub failed_attempts: Vec<Attempt>,
    pub elapsed: Duration,
}

impl RoutedCompletion {
    pub fn text(&self) -> &str {
        &self.completion.text
    }

    pub fn served_tier(&self) -> Tier {
        self.model.tier
    }

    /// Route metadata attached to agent responses.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("model".into(), json!(self.model.name));
        meta.insert("provider".into(), json!(self.model.provider));
        meta.insert("tier".into(), json!(self.requested_tier));
        meta.insert("served_tier".into(), json!(self.model.tier));
        meta.insert("substitution".into(), json!(self.substitution));
        meta.insert("failed_attempts".into(), json!(self.failed_attempts));
        if let Some(usage) = &self.completion.usage {
            meta.insert("usage".into(), json!(usage));
        }
        meta
    }
}

/// Outcome of racing a future against cancellation and a deadline.
enum Bounded<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

async fn bounded<T>(cancel: &CancellationToken, limit: Duration, fut: impl Future<Output = T>) -> Bounded<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        r = tokio::time::timeout(limit, fut) => match r {
            Ok(v) => Bounded::Done(v),
            Err(_) => Bounded::TimedOut,
        },
    }
}

/// Errors that say nothing good about the provider's other models either.
fn provider_wide(e: &LlmError) -> bool {
    matches!(
        e,
        LlmError::AuthFailed | LlmError::RateLimited { .. } | LlmError::Unavailable(_) | LlmError::NetworkError(_)
    )
}

pub struct ModelRouter {
    registry: ModelRegistry,
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    health: ProviderHealth,
    telemetry: RouterTelemetry,
    config: RouterConfig,
}

impl ModelRouter {
    pub fn new(registry: ModelRegistry, config: RouterConfig) -> Self {
        Self {
            registry: registry.with_escalation(config.escalate),
            providers: HashMap::new(),
            health: ProviderHealth::default(),
            telemetry: RouterTelemetry::new(),
            config,
        }
    }

    /// Register an adapter under its own [`LlmProvider::name`].
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn with_providers(self, providers: impl IntoIterator<Item = Arc<dyn LlmProvider>>) -> Self {
        providers.into_iter().fold(self, |router, p| router.with_provider(p))
    }

    pub fn with_health(mut self, health: ProviderHealth) -> Self {
        self.health = health;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn telemetry(&self) -> &RouterTelemetry {
        &self.telemetry
    }

    pub fn health(&self) -> &ProviderHealth {
        &self.health
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Candidates a request would walk, with the default tier applied.
    pub fn candidates(&self, model: Option<&str>, tier: Option<Tier>) -> Vec<ModelEntry> {
        self.registry.resolve(model, self.effective_tier(model, tier))
    }

    fn effective_tier(&self, model: Option<&str>, tier: Option<Tier>) -> Option<Tier> {
        match (model, tier) {
            (None, None) => Some(self.config.default_tier),
            _ => tier,
        }
    }

    fn record(&self, attempts: &mut Vec<Attempt>, entry: &ModelEntry, reason: AttemptFailure) {
        warn!(provider = %entry.provider, model = %entry.name, reason = %reason, "candidate failed");
        self.telemetry.record_failure(&entry.provider, reason.to_string());
        attempts.push(Attempt {
            provider: entry.provider.clone(),
            model: entry.name.clone(),
            reason,
        });
    }

    /// Serve `request` from the first candidate that answers.
    pub async fn route(&self, request: RouteRequest, cancel: &CancellationToken) -> Result<RoutedCompletion, RouteError> {
        let started = Instant::now();
        let tier = self.effective_tier(request.model.as_deref(), request.tier);
        let candidates = self.registry.resolve(request.model.as_deref(), tier);
        let requested_tier = match (tier, candidates.first()) {
            (Some(t), _) => t,
            (None, Some(first)) => first.tier,
            (None, None) => return Err(RouteError::EmptyCandidates),
        };
        if candidates.is_empty() {
            return Err(RouteError::EmptyCandidates);
        }

        let mut attempts = Vec::new();
        // provider id -> usable for the rest of this attempt
        let mut checked: HashMap<String, bool> = HashMap::new();

        for entry in &candidates {
            if cancel.is_cancelled() {
                return Err(RouteError::Cancelled);
            }
            if checked.get(&entry.provider) == Some(&false) {
                continue;
            }

            let Some(provider) = self.providers.get(&entry.provider) else {
                checked.insert(entry.provider.clone(), false);
                self.record(&mut attempts, entry, AttemptFailure::NotConfigured);
                continue;
            };

            if let Err(wait) = self.health.admit(&entry.provider) {
                checked.insert(entry.provider.clone(), false);
                let reason = AttemptFailure::CircuitOpen { retry_in_ms: wait.as_millis() as u64 };
                self.record(&mut attempts, entry, reason);
                continue;
            }

            if !checked.contains_key(&entry.provider) {
                match bounded(cancel, self.config.health_timeout(), provider.health_check()).await {
                    Bounded::Cancelled => {
                        self.health.abandon(&entry.provider);
                        return Err(RouteError::Cancelled);
                    }
                    Bounded::Done(Ok(())) => {
                        checked.insert(entry.provider.clone(), true);
                    }
                    outcome => {
                        let message = match outcome {
                            Bounded::Done(Err(e)) => e.to_string(),
                            _ => format!("health check timed out after {}ms", self.config.health_timeout_ms),
                        };
                        checked.insert(entry.provider.clone(), false);
                        self.health.record_failure(&entry.provider);
                        self.record(&mut attempts, entry, AttemptFailure::Unavailable { message });
                        continue;
                    }
                }
            }

            debug!(provider = %entry.provider, model = %entry.name, "calling candidate");
            let call_started = Instant::now();
            let call = provider.complete(request.request.for_model(&entry.name), Some(cancel.child_token()));

            let failure = match bounded(cancel, self.config.call_timeout(), call).await {
                Bounded::Cancelled | Bounded::Done(Err(LlmError::Cancelled)) => {
                    self.health.abandon(&entry.provider);
                    return Err(RouteError::Cancelled);
                }
                Bounded::Done(Ok(completion)) => {
                    let latency = call_started.elapsed();
                    self.health.record_success(&entry.provider);
                    self.telemetry.record_success(entry, latency, completion.usage.as_ref());

                    let substitution = Substitution::between(requested_tier, entry.tier);
                    if substitution != Substitution::None {
                        info!(
                            requested = %requested_tier,
                            served = %entry.tier,
                            model = %entry.name,
                            "tier substituted"
                        );
                    }
                    info!(
                        provider = %entry.provider,
                        model = %entry.name,
                        elapsed_ms = latency.as_millis() as u64,
                        failed = attempts.len(),
                        "routed"
                    );
                    return Ok(RoutedCompletion {
                        completion,
                        model: entry.clone(),
                        requested_tier,
                        substitution,
                        failed_attempts: attempts,
                        elapsed: started.elapsed(),
                    });
                }
                Bounded::TimedOut => {
                    checked.insert(entry.provider.clone(), false);
                    AttemptFailure::Timeout { after_ms: self.config.call_timeout_ms }
                }
                Bounded::Done(Err(e)) => {
                    if provider_wide(&e) {
                        checked.insert(entry.provider.clone(), false);
                    }
                    AttemptFailure::Provider { message: e.to_string() }
                }
            };
            self.health.record_failure(&entry.provider);
            self.record(&mut attempts, entry, failure);
        }

        Err(RouteError::NoProviderAvailable { attempts })
    }
}
