//! Agent handlers
//!
//! An agent turns an [`AgentInput`] into text. The built-in agents are all
//! [`LlmAgent`]s that differ only in persona and routing preferences.

use cortex_core::Tier;
use cortex_llm::{LlmMessage, LlmRequest};
use cortex_router::{ModelRouter, RouteError, RouteRequest};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What an agent is asked to do.
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub prompt: String,
    /// Recalled memory, upstream agent output, caller-supplied notes.
    pub context: Option<String>,
}

impl AgentInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), context: None }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// Append a labelled block to the context.
    pub fn append_context(&mut self, label: &str, body: &str) {
        let block = format!("[{}]\n{}", label, body.trim());
        self.context = Some(match self.context.take() {
            Some(existing) => format!("{}\n\n{}", existing, block),
            None => block,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub content: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("{0}")]
    Failed(String),

    #[error("cancelled")]
    Cancelled,
}

#[async_trait::async_trait]
pub trait AgentHandler: Send + Sync {
    async fn run(&self, input: &AgentInput, cancel: &CancellationToken) -> Result<AgentOutput, AgentError>;
}

/// Routing and sampling preferences of an [`LlmAgent`].
#[derive(Debug, Clone)]
pub struct LlmAgentProfile {
    pub tier: Tier,
    /// Pin a model ahead of the tier's own candidates.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// Agent backed by the model router.
pub struct LlmAgent {
    profile: LlmAgentProfile,
    router: Arc<ModelRouter>,
}

impl LlmAgent {
    pub fn new(profile: LlmAgentProfile, router: Arc<ModelRouter>) -> Self {
        Self { profile, router }
    }

    pub fn profile(&self) -> &LlmAgentProfile {
        &self.profile
    }

    fn request(&self, input: &AgentInput) -> LlmRequest {
        let mut system = self.profile.system_prompt.clone();
        if let Some(context) = &input.context {
            system.push_str("\n\n## Context\n");
            system.push_str(context);
        }
        LlmRequest {
            messages: vec![LlmMessage::user(input.prompt.clone())],
            system: Some(system),
            temperature: Some(self.profile.temperature),
            max_tokens: Some(self.profile.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl AgentHandler for LlmAgent {
    async fn run(&self, input: &AgentInput, cancel: &CancellationToken) -> Result<AgentOutput, AgentError> {
        let request = RouteRequest {
            model: self.profile.model.clone(),
            tier: Some(self.profile.tier),
            request: self.request(input),
        };
        debug!(tier = %self.profile.tier, "agent routing request");
        let routed = self.router.route(request, cancel).await.map_err(|e| match e {
            RouteError::Cancelled => AgentError::Cancelled,
            other => AgentError::Route(other),
        })?;
        let metadata = routed.metadata();
        Ok(AgentOutput { content: routed.completion.text, metadata })
    }
}
