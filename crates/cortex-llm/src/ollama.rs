//! Local Ollama provider

use crate::provider::{cancellable, single_shot, status_error, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{Completion, LlmRequest, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(OLLAMA_BASE_URL)
    }
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    /// The daemon is up if it can list its local models.
    async fn health_check(&self) -> LlmResult<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("ollama unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(LlmError::Unavailable(format!("ollama returned {}", response.status())));
        }
        Ok(())
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let completion = self.complete(request, cancel).await?;
        Ok(single_shot(completion))
    }

    async fn complete(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<Completion> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(OllamaMessage { role: "system".into(), content: system.clone() });
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| OllamaMessage { role: m.role.clone(), content: m.content.clone() }),
        );

        let body = OllamaChat {
            model: request.model.clone(),
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(0.7),
                num_predict: request.max_tokens.unwrap_or(2048),
            },
        };
        debug!("Ollama request: model={}", body.model);

        let call = async {
            let response = self
                .client
                .post(format!("{}/api/chat", self.base_url))
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(status_error(status, &text, None));
            }
            let raw = response.text().await?;
            parse_response(&raw)
        };

        cancellable(cancel.as_ref(), call).await
    }
}

fn parse_response(raw: &str) -> LlmResult<Completion> {
    let parsed: OllamaResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    if parsed.message.content.trim().is_empty() {
        return Err(LlmError::InvalidResponse("empty message content".into()));
    }
    Ok(Completion {
        text: parsed.message.content,
        usage: Some(Usage {
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
        }),
        stop_reason: parsed.done_reason,
    })
}

#[derive(Serialize)]
struct OllamaChat {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    done_reason: Option<String>,
}
