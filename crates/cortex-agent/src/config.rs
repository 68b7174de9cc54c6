//! `[coordinator]` and `[agents.*]` config sections

use cortex_core::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Per-agent wall-clock limit, applied to every branch of every pattern.
    pub agent_timeout_ms: u64,
    /// Infer required capabilities from prompt keywords when a task has no hints.
    pub infer_capabilities: bool,
    /// Supervisor of hierarchical workflows that don't name one.
    pub supervisor: String,
    /// Combine multi-agent parallel and hierarchical results with a model call.
    pub synthesize: bool,
    /// Tier used for that call.
    pub synthesis_tier: Tier,
    pub synthesis_max_tokens: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 120_000,
            infer_capabilities: true,
            supervisor: "supervisor".to_string(),
            synthesize: true,
            synthesis_tier: Tier::Fast,
            synthesis_max_tokens: 1_024,
        }
    }
}

impl CoordinatorConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

/// Per-agent overrides of the built-in profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOverride {
    pub enabled: bool,
    pub tier: Option<Tier>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AgentOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            tier: None,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Keyed by agent name.
pub type AgentsConfig = BTreeMap<String, AgentOverride>;
