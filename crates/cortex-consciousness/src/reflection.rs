//! Reflection summaries

use crate::error::{ConsciousnessError, Result};
use crate::memory::Turn;
use cortex_core::Tier;
use cortex_llm::{LlmMessage, LlmRequest};
use cortex_router::{ModelRouter, RouteRequest};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const REFLECTION_PROMPT: &str = "You maintain the long-term memory of a personal assistant. \
Summarize the conversation excerpt below in at most three sentences. Keep names, dates, numbers, \
decisions and anything the user asked to be remembered. Write in the third person and output \
only the summary.";

/// Condenses a run of turns into one memory-sized summary.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, turns: &[Turn], cancel: &CancellationToken) -> Result<String>;
}

/// One line per turn, oldest first.
pub fn transcript(turns: &[Turn]) -> String {
    turns.iter().map(Turn::transcript_line).collect::<Vec<_>>().join("\n")
}

/// Summarizes through the model router at a fixed tier.
pub struct RouterSummarizer {
    router: Arc<ModelRouter>,
    tier: Tier,
    max_tokens: u32,
}

impl RouterSummarizer {
    pub fn new(router: Arc<ModelRouter>, tier: Tier, max_tokens: u32) -> Self {
        Self { router, tier, max_tokens }
    }
}

#[async_trait::async_trait]
impl Summarizer for RouterSummarizer {
    async fn summarize(&self, turns: &[Turn], cancel: &CancellationToken) -> Result<String> {
        let request = RouteRequest {
            model: None,
            tier: Some(self.tier),
            request: LlmRequest {
                messages: vec![LlmMessage::user(transcript(turns))],
                system: Some(REFLECTION_PROMPT.to_string()),
                temperature: Some(0.2),
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            },
        };
        let routed = self
            .router
            .route(request, cancel)
            .await
            .map_err(|e| ConsciousnessError::ReflectionFailure(e.to_string()))?;
        let summary = routed.text().trim().to_string();
        if summary.is_empty() {
            return Err(ConsciousnessError::ReflectionFailure("empty summary".into()));
        }
        debug!(model = %routed.model.name, turns = turns.len(), "reflection summary");
        Ok(summary)
    }
}
