//! Stack assembly
//!
//! config -> providers -> router -> agents -> coordinator -> consciousness

use anyhow::Context;
use cortex_agent::{default_registry, Coordinator, RouterSynthesizer};
use cortex_consciousness::{
    Consciousness, CortexConfig, JsonFileMemoryStore, JsonFileStateStore, RouterSummarizer,
};
use cortex_llm::LlmProvider;
use cortex_router::{build_providers, ModelRouter, ProviderHealth};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Subdirectory of the state dir holding session state.
pub const SESSIONS_DIR: &str = "sessions";
/// Subdirectory of the state dir holding episodic memories.
pub const MEMORIES_DIR: &str = "memories";

/// The assembled runtime.
pub struct Cortex {
    pub config: CortexConfig,
    pub router: Arc<ModelRouter>,
    pub coordinator: Arc<Coordinator>,
    pub engine: Arc<Consciousness>,
}

impl Cortex {
    /// Build with adapters for every provider that has a key in the environment.
    pub fn from_config(config: CortexConfig, state_dir: Option<&Path>) -> anyhow::Result<Self> {
        let providers = build_providers(&config.providers);
        Self::with_providers(config, providers, state_dir)
    }

    /// Build over an explicit adapter set.
    ///
    /// Without a state dir, sessions and memories live in memory only.
    pub fn with_providers(
        config: CortexConfig,
        providers: Vec<Arc<dyn LlmProvider>>,
        state_dir: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let registry = config.model_registry().context("invalid model catalog")?;
        let router = Arc::new(
            ModelRouter::new(registry, config.router.clone())
                .with_health(ProviderHealth::from_config(&config.breaker))
                .with_providers(providers),
        );

        let agents = default_registry(&router, &config.agents).context("invalid agent roster")?;
        let synthesizer = Arc::new(RouterSynthesizer::new(
            Arc::clone(&router),
            config.coordinator.synthesis_tier,
            config.coordinator.synthesis_max_tokens,
        ));
        let coordinator = Arc::new(
            Coordinator::new(Arc::new(agents), config.coordinator.clone()).with_synthesizer(synthesizer),
        );

        let summarizer = Arc::new(RouterSummarizer::new(
            Arc::clone(&router),
            config.engine.reflection_tier,
            config.engine.reflection_max_tokens,
        ));
        let mut engine = Consciousness::new(Arc::clone(&coordinator), summarizer, config.engine.clone());
        if let Some(dir) = state_dir {
            engine = engine
                .with_state_store(Arc::new(JsonFileStateStore::new(dir.join(SESSIONS_DIR))))
                .with_memory_store(Arc::new(JsonFileMemoryStore::new(dir.join(MEMORIES_DIR))));
            info!(state_dir = %dir.display(), "persistent sessions enabled");
        }

        info!(
            models = router.registry().entries().len(),
            providers = ?router.provider_ids(),
            agents = coordinator.registry().len(),
            "cortex ready"
        );

        Ok(Self { config, router, coordinator, engine: Arc::new(engine) })
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

/// `$HOME/.cortex`, or `./.cortex` without a home.
pub fn default_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".cortex")
}
