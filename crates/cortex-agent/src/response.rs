//! Coordinator results

use crate::workflow::Plan;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Where an agent call broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Routing,
    Agent,
    Timeout,
    Cancelled,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Routing => "routing",
            FailureStage::Agent => "agent",
            FailureStage::Timeout => "timeout",
            FailureStage::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentFailure {
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub agent: String,
    pub content: String,
    pub elapsed_ms: u64,
    pub metadata: Map<String, Value>,
    pub error: Option<AgentFailure>,
}

impl AgentResponse {
    pub fn ok(agent: impl Into<String>, content: String, elapsed_ms: u64, metadata: Map<String, Value>) -> Self {
        Self {
            agent: agent.into(),
            content,
            elapsed_ms,
            metadata,
            error: None,
        }
    }

    pub fn failed(agent: impl Into<String>, stage: FailureStage, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            agent: agent.into(),
            content: String::new(),
            elapsed_ms,
            metadata: Map::new(),
            error: Some(AgentFailure { stage, message: message.into() }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Sequential,
    Parallel,
    Hierarchical,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub pattern: Pattern,
    pub content: String,
    /// One slot per agent, in declaration order. Failed slots keep `error`.
    pub contributions: Vec<AgentResponse>,
    /// `content` came from a synthesis call rather than the contributions.
    pub synthesized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl AggregateResponse {
    pub fn failures(&self) -> impl Iterator<Item = &AgentResponse> {
        self.contributions.iter().filter(|c| !c.is_ok())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinatorResponse {
    Single(AgentResponse),
    Aggregate(AggregateResponse),
}

impl CoordinatorResponse {
    pub fn content(&self) -> &str {
        match self {
            CoordinatorResponse::Single(r) => &r.content,
            CoordinatorResponse::Aggregate(a) => &a.content,
        }
    }

    /// Names of every agent that took part, in order.
    pub fn agents(&self) -> Vec<&str> {
        match self {
            CoordinatorResponse::Single(r) => vec![r.agent.as_str()],
            CoordinatorResponse::Aggregate(a) => a.contributions.iter().map(|c| c.agent.as_str()).collect(),
        }
    }

    /// First failure, if the answer is a single failed agent call.
    pub fn failure(&self) -> Option<&AgentFailure> {
        match self {
            CoordinatorResponse::Single(r) => r.error.as_ref(),
            CoordinatorResponse::Aggregate(a) if a.contributions.iter().all(|c| !c.is_ok()) => {
                a.contributions.first().and_then(|c| c.error.as_ref())
            }
            CoordinatorResponse::Aggregate(_) => None,
        }
    }

    /// Route metadata of the answering agent (the last successful one for aggregates).
    pub fn metadata(&self) -> Map<String, Value> {
        match self {
            CoordinatorResponse::Single(r) => r.metadata.clone(),
            CoordinatorResponse::Aggregate(a) => {
                let mut meta = a
                    .contributions
                    .iter()
                    .rev()
                    .find(|c| c.is_ok())
                    .map(|c| c.metadata.clone())
                    .unwrap_or_default();
                meta.insert("pattern".into(), serde_json::json!(a.pattern));
                meta
            }
        }
    }
}
