//! Combining several agents' answers into one reply

use crate::agent::AgentError;
use crate::response::AgentResponse;
use cortex_core::Tier;
use cortex_llm::{LlmMessage, LlmRequest};
use cortex_router::{ModelRouter, RouteError, RouteRequest};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SYNTHESIS_PROMPT: &str = "You merge the work of several specialist agents into one reply.

Answer the original request using their responses. Keep every concrete fact,
drop repetition, resolve contradictions in favour of the more specific
response, and do not mention the agents.";

#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// One reply for `request` built from `contributions` (all successful).
    async fn synthesize(
        &self,
        request: &str,
        contributions: &[&AgentResponse],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError>;
}

/// The request followed by each contribution under its agent's name.
pub fn synthesis_input(request: &str, contributions: &[&AgentResponse]) -> String {
    let mut text = format!("Original request: {}\n", request.trim());
    for c in contributions {
        text.push_str(&format!("\n--- {} ---\n{}\n", c.agent, c.content.trim()));
    }
    text
}

/// Synthesizes through the model router at a fixed tier.
pub struct RouterSynthesizer {
    router: Arc<ModelRouter>,
    tier: Tier,
    max_tokens: u32,
}

impl RouterSynthesizer {
    pub fn new(router: Arc<ModelRouter>, tier: Tier, max_tokens: u32) -> Self {
        Self { router, tier, max_tokens }
    }
}

#[async_trait::async_trait]
impl Synthesizer for RouterSynthesizer {
    async fn synthesize(
        &self,
        request: &str,
        contributions: &[&AgentResponse],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let route = RouteRequest {
            model: None,
            tier: Some(self.tier),
            request: LlmRequest {
                messages: vec![LlmMessage::user(synthesis_input(request, contributions))],
                system: Some(SYNTHESIS_PROMPT.to_string()),
                temperature: Some(0.3),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            },
        };
        let routed = self.router.route(route, cancel).await.map_err(|e| match e {
            RouteError::Cancelled => AgentError::Cancelled,
            other => AgentError::Route(other),
        })?;
        let text = routed.text().trim().to_string();
        if text.is_empty() {
            return Err(AgentError::Failed("empty synthesis".into()));
        }
        debug!(model = %routed.model.name, parts = contributions.len(), "synthesized");
        Ok(text)
    }
}
