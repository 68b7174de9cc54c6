//! Anthropic Claude API provider with SSE streaming

use crate::provider::{cancellable, retry_after_secs, status_error, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn health_check(&self) -> LlmResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Unavailable("anthropic api key not configured".into()));
        }
        Ok(())
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = MessagesBody::from(&request);
        debug!(model = %body.model, messages = body.messages.len(), "anthropic request");

        let send = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();
        let response = cancellable(cancel.as_ref(), async { send.await.map_err(LlmError::from) }).await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, model = %body.model, "anthropic call rejected");
            return Err(status_error(status, &text, retry_after));
        }

        Ok(Box::pin(parse_sse_stream(response.bytes_stream(), cancel.unwrap_or_default())))
    }
}

/// One server-sent event: its `event:` name and `data:` payload.
#[derive(Debug, PartialEq)]
struct SseEvent {
    kind: String,
    data: String,
}

/// Split the next complete event off the front of `buffer`. CRLF framing is
/// folded to LF first; a trailing lone `\r` waits for the next chunk.
fn next_event(buffer: &mut String) -> Option<SseEvent> {
    if buffer.contains("\r\n") {
        *buffer = buffer.replace("\r\n", "\n");
    }
    let end = buffer.find("\n\n")?;
    let block: String = buffer.drain(..end + 2).collect();
    let mut event = SseEvent { kind: String::new(), data: String::new() };
    for line in block.lines() {
        if let Some(kind) = line.strip_prefix("event:") {
            event.kind = kind.trim().to_string();
        } else if let Some(data) = line.strip_prefix("data:") {
            event.data = data.trim().to_string();
        }
    }
    Some(event)
}

/// Folds Messages API events into stream deltas.
#[derive(Default)]
struct EventFolder {
    usage: Usage,
    stop_reason: Option<String>,
}

impl EventFolder {
    fn fold(&mut self, event: SseEvent) -> Option<LlmResult<StreamDelta>> {
        match event.kind.as_str() {
            "message_start" => {
                if let Ok(start) = serde_json::from_str::<MessageStart>(&event.data) {
                    self.usage.input_tokens = start.message.usage.input_tokens;
                }
                None
            }
            "content_block_delta" => match serde_json::from_str::<BlockDelta>(&event.data) {
                Ok(BlockDelta { delta: DeltaKind::Text { text } }) => Some(Ok(StreamDelta::Text(text))),
                _ => None,
            },
            "message_delta" => {
                if let Ok(delta) = serde_json::from_str::<MessageDelta>(&event.data) {
                    if let Some(usage) = delta.usage {
                        self.usage.output_tokens = usage.output_tokens;
                    }
                    self.stop_reason = delta.delta.stop_reason.or(self.stop_reason.take());
                }
                None
            }
            "message_stop" => Some(Ok(StreamDelta::Done {
                stop_reason: self.stop_reason.clone().or_else(|| Some("end_turn".to_string())),
                usage: Some(self.usage),
            })),
            "error" => Some(Err(match serde_json::from_str::<ErrorEvent>(&event.data) {
                Ok(e) => LlmError::StreamError(e.error.message),
                Err(_) => LlmError::InvalidResponse(event.data),
            })),
            _ => None,
        }
    }
}

fn parse_sse_stream(
    bytes: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        let mut buffer = String::new();
        let mut folder = EventFolder::default();
        tokio::pin!(bytes);

        loop {
            // None: cancelled
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = bytes.next() => Some(chunk),
            };
            let chunk = match next {
                None => {
                    yield Err(LlmError::Cancelled);
                    break;
                }
                Some(None) => break,
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(e))) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    break;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(event) = next_event(&mut buffer) {
                if event.data.is_empty() {
                    continue;
                }
                if let Some(delta) = folder.fold(event) {
                    yield delta;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct MessagesBody {
    model: String,
    messages: Vec<Turn>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl From<&LlmRequest> for MessagesBody {
    fn from(request: &LlmRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Turn { role: m.role.clone(), content: m.content.clone() })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: true,
            system: request.system.clone(),
            temperature: request.temperature,
        }
    }
}

#[derive(Serialize)]
struct Turn {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessageStart {
    message: StartedMessage,
}

#[derive(Deserialize)]
struct StartedMessage {
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct BlockDelta {
    delta: DeltaKind,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaKind {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: StopInfo,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StopInfo {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::drain;

    fn sse(events: &[(&str, &str)]) -> Vec<Result<bytes::Bytes, reqwest::Error>> {
        events
            .iter()
            .map(|(e, d)| Ok(bytes::Bytes::from(format!("event: {}\ndata: {}\n\n", e, d))))
            .collect()
    }

    #[tokio::test]
    async fn parses_text_and_usage() {
        let chunks = sse(&[
            ("message_start", r#"{"message":{"usage":{"input_tokens":12}}}"#),
            ("content_block_delta", r#"{"index":0,"delta":{"type":"text_delta","text":"Hel"}}"#),
            ("content_block_delta", r#"{"index":0,"delta":{"type":"text_delta","text":"lo"}}"#),
            ("message_delta", r#"{"delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#),
            ("message_stop", r#"{}"#),
        ]);
        let stream = parse_sse_stream(futures::stream::iter(chunks), CancellationToken::new());
        let completion = drain(Box::pin(stream), None).await.unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.usage, Some(Usage { input_tokens: 12, output_tokens: 3 }));
    }

    #[test]
    fn events_split_across_chunks() {
        let mut buffer = String::from("event: message_stop\ndata: {}\n\nevent: content_blo");
        let first = next_event(&mut buffer).unwrap();
        assert_eq!(first, SseEvent { kind: "message_stop".into(), data: "{}".into() });
        assert!(next_event(&mut buffer).is_none());
        assert_eq!(buffer, "event: content_blo");
    }

    #[tokio::test]
    async fn crlf_framed_stream_is_parsed() {
        let raw = "event: content_block_delta\r\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\r\n\r\n\
                   event: message_stop\r\ndata: {}\r";
        let chunks: Vec<Result<bytes::Bytes, reqwest::Error>> =
            vec![Ok(bytes::Bytes::from(raw)), Ok(bytes::Bytes::from("\n\r\n"))];
        let stream = parse_sse_stream(futures::stream::iter(chunks), CancellationToken::new());
        let completion = drain(Box::pin(stream), None).await.unwrap();
        assert_eq!(completion.text, "hi");
        assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn error_event_surfaces_as_stream_error() {
        let chunks = sse(&[("error", r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#)]);
        let stream = parse_sse_stream(futures::stream::iter(chunks), CancellationToken::new());
        let err = drain(Box::pin(stream), None).await.unwrap_err();
        assert!(matches!(err, LlmError::StreamError(m) if m == "Overloaded"));
    }

    #[tokio::test]
    async fn health_check_requires_api_key() {
        assert!(AnthropicProvider::new("").health_check().await.is_err());
        assert!(AnthropicProvider::new("sk-test").health_check().await.is_ok());
    }
}
