//! Cortex Router - tiered model selection with ordered provider fallback

pub mod config;
pub mod health;
pub mod providers;
pub mod registry;
pub mod router;
pub mod telemetry;

pub use config::{default_catalog, BreakerConfig, ProviderEndpoint, ProvidersConfig, RouterConfig};
pub use health::{CircuitState, ProviderHealth};
pub use providers::{build_providers, build_providers_with};
pub use registry::{infer_provider, ModelEntry, ModelRegistry};
pub use router::{Attempt, AttemptFailure, ModelRouter, RouteError, RouteRequest, RoutedCompletion, Substitution};
pub use telemetry::{ProviderStats, RouterTelemetry};
