//! Cortex configuration
//!
//! Every tunable in one TOML file. Each section falls back to its defaults
//! when omitted, and a missing or unparsable file yields the full default
//! config.

use cortex_agent::{AgentsConfig, CoordinatorConfig};
use cortex_core::{Result, Tier};
use cortex_router::{default_catalog, BreakerConfig, ModelEntry, ModelRegistry, ProvidersConfig, RouterConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    pub router: RouterConfig,
    pub breaker: BreakerConfig,
    pub providers: ProvidersConfig,
    pub coordinator: CoordinatorConfig,
    pub engine: EngineConfig,
    /// Per-agent overrides, keyed by agent name.
    pub agents: AgentsConfig,
    /// Model catalog. Replaces the built-in catalog when present.
    pub models: Vec<ModelEntry>,
}

/// Memory, reflection and mood parameters of the consciousness engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reflect once the conversation holds this many turns.
    pub reflect_after_turns: usize,
    /// Reflect when this long has passed since the last reflection.
    pub reflect_interval_secs: u64,
    /// Newest turns kept verbatim after a reflection.
    pub retain_turns: usize,
    /// Turns summarized into each episodic memory.
    pub reflection_chunk_turns: usize,
    /// Hard bound on conversation length. Oldest turns are evicted first.
    pub max_turns: usize,
    /// Episodic memories whose decayed importance falls below this are pruned.
    pub retention_threshold: f64,
    /// Importance halves after this many hours without access.
    pub importance_half_life_hours: f64,
    /// Importance added each time a memory is recalled.
    pub recall_boost: f64,
    /// Largest change of any mood field per turn.
    pub mood_rate: f64,
    /// Reply length (chars) at which arousal saturates.
    pub arousal_length_scale: f64,
    /// Passages and memories recalled per turn, each.
    pub top_k: usize,
    /// Recent turns included as context for the coordinator.
    pub history_turns: usize,
    /// Topics remembered per session.
    pub max_topics: usize,
    /// Tier used for reflection summaries.
    pub reflection_tier: Tier,
    pub reflection_max_tokens: u32,
    /// Live sessions idle this long are dropped from memory. 0 keeps them.
    pub session_idle_secs: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            breaker: BreakerConfig::default(),
            providers: ProvidersConfig::default(),
            coordinator: CoordinatorConfig::default(),
            engine: EngineConfig::default(),
            agents: AgentsConfig::default(),
            models: default_catalog(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reflect_after_turns: 20,
            reflect_interval_secs: 3_600,
            retain_turns: 6,
            reflection_chunk_turns: 6,
            max_turns: 50,
            retention_threshold: 0.1,
            importance_half_life_hours: 168.0,
            recall_boost: 0.1,
            mood_rate: 0.1,
            arousal_length_scale: 800.0,
            top_k: 5,
            history_turns: 6,
            max_topics: 10,
            reflection_tier: Tier::Fast,
            reflection_max_tokens: 512,
            session_idle_secs: 3_600,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl CortexConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded config");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| cortex_core::Error::config(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Current config as TOML, for generating a starter file.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Registry over the configured catalog.
    pub fn model_registry(&self) -> Result<ModelRegistry> {
        ModelRegistry::new(self.models.clone())
    }
}

impl EngineConfig {
    pub fn reflect_interval(&self) -> Duration {
        Duration::from_secs(self.reflect_interval_secs)
    }

    pub fn session_idle(&self) -> Option<Duration> {
        (self.session_idle_secs > 0).then(|| Duration::from_secs(self.session_idle_secs))
    }

    /// Reject combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(cortex_core::Error::config("engine.max_turns must be at least 1"));
        }
        if self.retain_turns >= self.max_turns {
            return Err(cortex_core::Error::config("engine.retain_turns must be below engine.max_turns"));
        }
        // the length trigger has to fire before the hard bound starts evicting
        if self.reflect_after_turns > self.max_turns {
            return Err(cortex_core::Error::config(
                "engine.reflect_after_turns must not exceed engine.max_turns",
            ));
        }
        if self.reflect_after_turns <= self.retain_turns {
            return Err(cortex_core::Error::config(
                "engine.reflect_after_turns must be above engine.retain_turns",
            ));
        }
        if self.importance_half_life_hours <= 0.0 {
            return Err(cortex_core::Error::config("engine.importance_half_life_hours must be positive"));
        }
        if self.arousal_length_scale <= 0.0 {
            return Err(cortex_core::Error::config("engine.arousal_length_scale must be positive"));
        }
        Ok(())
    }
}
