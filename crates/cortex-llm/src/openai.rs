//! OpenAI-compatible chat completions provider
//!
//! Serves OpenAI itself and any backend exposing the same
//! `/chat/completions` surface (Gemini's OpenAI endpoint included).

use crate::provider::{
    cancellable, retry_after_secs, single_shot, status_error, LlmError, LlmProvider, LlmResult,
    LlmStream,
};
use crate::types::{Completion, LlmRequest, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub struct OpenAiProvider {
    client: Client,
    id: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::compatible("openai", api_key, OPENAI_BASE_URL)
    }

    /// Gemini through Google's OpenAI-compatible endpoint.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::compatible("gemini", api_key, GEMINI_OPENAI_BASE_URL)
    }

    pub fn compatible(id: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            id: id.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage { role: "system".into(), content: system.clone() });
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| ChatMessage { role: m.role.clone(), content: m.content.clone() }),
        );
        ChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn health_check(&self) -> LlmResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Unavailable(format!("{} api key not configured", self.id)));
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
        let body = Self::build_body(&request);
        debug!("{} request: model={}", self.id, body.model);

        let url = format!("{}/chat/completions", self.base_url);
        let call = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let retry_after = retry_after_secs(response.headers());
                let text = response.text().await.unwrap_or_default();
                error!("{} error {}", self.id, status);
                return Err(status_error(status, &text, retry_after));
            }

            let raw = response.text().await?;
            parse_response(&raw)
        };

        cancellable(cancel.as_ref(), call).await
    }
}

fn parse_response(raw: &str) -> LlmResult<Completion> {
    let parsed: ChatResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices".into()))?;
    let text = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("empty message content".into()))?;

    Ok(Completion {
        text,
        usage: parsed.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: choice.finish_reason,
    })
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmMessage;

    #[test]
    fn system_prompt_goes_first() {
        let req = LlmRequest {
            model: "gpt-4o".into(),
            messages: vec![LlmMessage::user("hi")],
            system: Some("be brief".into()),
            ..Default::default()
        };
        let body = OpenAiProvider::build_body(&req);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].content, "hi");
    }

    #[test]
    fn parses_choice_and_usage() {
        let raw = r#"{"choices":[{"message":{"content":"hey"},"finish_reason":"stop"}],
                      "usage":{"prompt_tokens":5,"completion_tokens":1}}"#;
        let c = parse_response(raw).unwrap();
        assert_eq!(c.text, "hey");
        assert_eq!(c.usage.unwrap().total(), 6);
        assert_eq!(c.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn missing_content_is_invalid() {
        let raw = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(parse_response(raw), Err(LlmError::InvalidResponse(_))));
        assert!(matches!(parse_response("not json"), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn gemini_uses_its_own_id() {
        let p = OpenAiProvider::gemini("k");
        assert_eq!(p.name(), "gemini");
        assert!(p.base_url.starts_with("https://generativelanguage"));
    }
}
