//! Adapter construction from the `[providers]` config section

use crate::config::{ProviderEndpoint, ProvidersConfig};
use cortex_llm::{AnthropicProvider, LlmProvider, OllamaProvider, OpenAiProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Build every enabled adapter, reading API keys from the process environment.
pub fn build_providers(config: &ProvidersConfig) -> Vec<Arc<dyn LlmProvider>> {
    build_providers_with(config, |var| std::env::var(var).ok())
}

/// Same as [`build_providers`] with an injectable key lookup.
///
/// Cloud adapters without a key are left out entirely, so their models show
/// up as `not configured` attempts instead of failing on every call.
pub fn build_providers_with(
    config: &ProvidersConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Arc<dyn LlmProvider>> {
    let key = |id: &str, endpoint: &ProviderEndpoint| -> Option<String> {
        if !endpoint.enabled {
            debug!(provider = id, "disabled in config");
            return None;
        }
        let found = endpoint
            .api_key_env
            .as_deref()
            .and_then(&lookup)
            .filter(|k| !k.trim().is_empty());
        if found.is_none() {
            debug!(provider = id, "no api key in environment, skipping");
        }
        found
    };

    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    if let Some(k) = key("anthropic", &config.anthropic) {
        let mut p = AnthropicProvider::new(k);
        if let Some(url) = &config.anthropic.base_url {
            p = p.with_base_url(url.clone());
        }
        providers.push(Arc::new(p));
    }
    if let Some(k) = key("openai", &config.openai) {
        let mut p = OpenAiProvider::new(k);
        if let Some(url) = &config.openai.base_url {
            p = p.with_base_url(url.clone());
        }
        providers.push(Arc::new(p));
    }
    if let Some(k) = key("gemini", &config.gemini) {
        let mut p = OpenAiProvider::gemini(k);
        if let Some(url) = &config.gemini.base_url {
            p = p.with_base_url(url.clone());
        }
        providers.push(Arc::new(p));
    }
    if config.ollama.enabled {
        let p = match &config.ollama.base_url {
            Some(url) => OllamaProvider::new(url.clone()),
            None => OllamaProvider::default(),
        };
        providers.push(Arc::new(p));
    }

    info!(
        providers = ?providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
        "model providers ready"
    );
    providers
}
