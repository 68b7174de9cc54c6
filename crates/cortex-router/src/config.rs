//! Router configuration
//!
//! The `[router]`, `[breaker]`, `[providers]` and `[[models]]` sections of the
//! Cortex config file. Every section falls back to defaults when omitted.

use crate::registry::ModelEntry;
use cortex_core::Tier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Hard limit on a single completion call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Hard limit on a single availability check, in milliseconds.
    pub health_timeout_ms: u64,
    /// Tier used when a request names neither a model nor a tier.
    pub default_tier: Tier,
    /// Walk the tier escalation chain after the requested tier is exhausted.
    pub escalate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before a provider is taken out of rotation.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before admitting a trial.
    pub cooldown_secs: u64,
}

/// Endpoint settings for one provider. Keys are read from the named
/// environment variable, never from the file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoint {
    pub enabled: bool,
    /// Override the adapter's default base URL.
    pub base_url: Option<String>,
    /// Environment variable holding the API key (cloud providers only).
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderEndpoint,
    pub openai: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
    pub ollama: ProviderEndpoint,
}

// ============================================================
// Defaults
// ============================================================

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 60_000,
            health_timeout_ms: 5_000,
            default_tier: Tier::Balanced,
            escalate: true,
        }
    }
}

impl RouterConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown_secs: 30 }
    }
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self { enabled: true, base_url: None, api_key_env: None }
    }
}

impl ProviderEndpoint {
    fn keyed(env: &str) -> Self {
        Self { api_key_env: Some(env.to_string()), ..Default::default() }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic: ProviderEndpoint::keyed("ANTHROPIC_API_KEY"),
            openai: ProviderEndpoint::keyed("OPENAI_API_KEY"),
            gemini: ProviderEndpoint::keyed("GEMINI_API_KEY"),
            ollama: ProviderEndpoint::default(),
        }
    }
}

/// Built-in model catalog, used when the config file has no `[[models]]` rows.
///
/// Costs are relative weights per thousand tokens; local models are nearly free.
pub fn default_catalog() -> Vec<ModelEntry> {
    use Tier::*;
    let row = |name: &str, provider: &str, tier: Tier, context_window: u32, cost: f64| {
        ModelEntry::new(name, provider, tier, context_window, cost)
    };
    vec![
        row("llama3.2", "ollama", Local, 128_000, 0.1),
        row("mistral", "ollama", Local, 32_000, 0.1),
        row("qwen2.5:14b", "ollama", Local, 32_000, 0.2),
        row("dolphin3", "ollama", Local, 32_000, 0.2),
        row("gemini-3-flash-preview", "gemini", Fast, 1_000_000, 0.3),
        row("claude-3-haiku-20240307", "anthropic", Fast, 200_000, 0.5),
        row("gpt-3.5-turbo", "openai", Fast, 16_000, 0.5),
        row("gpt-4o", "openai", Balanced, 128_000, 2.5),
        row("claude-3-5-sonnet-20240620", "anthropic", Balanced, 200_000, 3.0),
        row("gemini-3-pro-preview", "gemini", Smart, 1_000_000, 5.0),
        row("gpt-4-turbo", "openai", Smart, 128_000, 10.0),
        row("claude-3-opus-20240229", "anthropic", Smart, 200_000, 15.0),
        row("qwen2.5-coder:14b", "ollama", Coding, 32_000, 0.2),
        row("claude-3-7-sonnet-latest", "anthropic", Coding, 200_000, 3.0),
        row("llama3.2-vision", "ollama", Vision, 128_000, 0.2),
        row("gpt-4o-mini", "openai", Vision, 128_000, 0.6),
    ]
}
