//! Model catalog and candidate resolution

use cortex_core::{Error, Result, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One routable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Provider id, matching [`cortex_llm::LlmProvider::name`].
    pub provider: String,
    pub tier: Tier,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    /// Relative cost weight per thousand tokens.
    #[serde(default = "default_cost")]
    pub cost: f64,
}

fn default_context_window() -> u32 {
    8_192
}

fn default_cost() -> f64 {
    1.0
}

impl ModelEntry {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        tier: Tier,
        context_window: u32,
        cost: f64,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            tier,
            context_window,
            cost,
        }
    }

    /// Entry for a model that isn't in the catalog. Local models are assumed
    /// free, everything else gets the neutral weight.
    pub fn inferred(name: &str) -> Self {
        let provider = infer_provider(name);
        let (tier, cost) = match provider {
            "ollama" => (Tier::Local, 0.0),
            _ => (Tier::Balanced, default_cost()),
        };
        Self::new(name, provider, tier, default_context_window(), cost)
    }
}

/// Guess the provider serving a model from its id.
pub fn infer_provider(model: &str) -> &'static str {
    let m = model.to_ascii_lowercase();
    if m.contains("claude") {
        "anthropic"
    } else if m.contains("gpt") || m.starts_with("o1") || m.starts_with("o3") {
        "openai"
    } else if m.contains("gemini") {
        "gemini"
    } else {
        "ollama"
    }
}

/// Read-only catalog, built once at startup.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    escalate: bool,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self { entries: Vec::new(), escalate: true }
    }
}

impl ModelRegistry {
    pub fn new(entries: Vec<ModelEntry>) -> Result<Self> {
        let mut registry = Self::default();
        for entry in entries {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, entry: ModelEntry) -> Result<()> {
        if self.get(&entry.name).is_some() {
            return Err(Error::DuplicateModel(entry.name));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Disable or enable escalation past the requested tier.
    pub fn with_escalation(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Models of one tier: cheapest first, then the largest context window,
    /// then catalog order.
    pub fn tier(&self, tier: Tier) -> Vec<&ModelEntry> {
        let mut models: Vec<&ModelEntry> = self.entries.iter().filter(|e| e.tier == tier).collect();
        // stable: ties keep registration order
        models.sort_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then_with(|| b.context_window.cmp(&a.context_window))
        });
        models
    }

    /// Ordered, de-duplicated candidate list for a request.
    ///
    /// The explicit model comes first, then the tier, then each escalation
    /// tier. When only a model is given its own tier drives the rest.
    pub fn resolve(&self, model: Option<&str>, tier: Option<Tier>) -> Vec<ModelEntry> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        let explicit = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| self.get(m).cloned().unwrap_or_else(|| ModelEntry::inferred(m)));
        let base = tier.or(explicit.as_ref().map(|e| e.tier));

        if let Some(entry) = explicit {
            seen.insert(entry.name.clone());
            candidates.push(entry);
        }

        let Some(base) = base else {
            return candidates;
        };

        let chain: &[Tier] = if self.escalate { base.escalation() } else { &[] };
        for tier in std::iter::once(base).chain(chain.iter().copied()) {
            for entry in self.tier(tier) {
                if seen.insert(entry.name.clone()) {
                    candidates.push(entry.clone());
                }
            }
        }
        candidates
    }
}
