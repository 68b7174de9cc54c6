//! Agent registry
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use crate::agent::AgentHandler;
use cortex_core::{Capability, Error, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub capabilities: BTreeSet<Capability>,
    pub handler: Arc<dyn AgentHandler>,
}

impl AgentDescriptor {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
        handler: Arc<dyn AgentHandler>,
    ) -> Result<Self> {
        let name = name.into();
        let capabilities: BTreeSet<Capability> = capabilities.into_iter().collect();
        if capabilities.is_empty() {
            return Err(Error::EmptyCapabilities(name));
        }
        Ok(Self {
            name,
            display_name: display_name.into(),
            description: description.into(),
            capabilities,
            handler,
        })
    }

    pub fn covers(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Serializable view of an agent for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
    by_name: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: AgentDescriptor) -> Result<()> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(Error::DuplicateAgent(descriptor.name));
        }
        self.by_name.insert(descriptor.name.clone(), self.agents.len());
        self.agents.push(descriptor);
        Ok(())
    }

    /// Agents declaring `capability`, in registration order.
    pub fn find(&self, capability: Capability) -> Vec<&AgentDescriptor> {
        self.agents
            .iter()
            .filter(|a| a.capabilities.contains(&capability))
            .collect()
    }

    pub fn by_name(&self, name: &str) -> Result<&AgentDescriptor> {
        self.get(name).ok_or_else(|| Error::UnknownAgent(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.by_name.get(name).map(|&i| &self.agents[i])
    }

    /// The agent covering every required capability with the fewest
    /// capabilities beyond them; ties go to the earliest registration.
    pub fn best_for(&self, required: &BTreeSet<Capability>) -> Option<&AgentDescriptor> {
        self.agents
            .iter()
            .filter(|a| a.covers(required))
            .min_by_key(|a| a.capabilities.len() - required.len())
    }

    pub fn list(&self) -> Vec<AgentInfo> {
        self.agents.iter().map(AgentDescriptor::info).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
