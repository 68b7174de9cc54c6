//! MockProvider: deterministic LLM responses for testing
//!
//! Scripted behaviours are consumed in order; once the script is exhausted the
//! default behaviour repeats. Every request is recorded so tests can assert on
//! what actually reached the provider.

use crate::provider::{cancellable, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use async_stream::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return a text-only response
    Text(String),
    /// Reply with `"<provider>: <last user message>"`
    Echo,
    /// Wait, then return text. Cancellation aborts the wait.
    Delayed { delay: Duration, text: String },
    /// Fail the request outright
    Error(String),
    /// Fail with a rate limit
    RateLimited,
    /// Start a stream that turns out to be garbage
    Malformed,
}

pub struct MockProvider {
    id: String,
    available: AtomicBool,
    behaviors: Mutex<VecDeque<MockBehavior>>,
    default_behavior: MockBehavior,
    calls: AtomicUsize,
    health_checks: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    /// Create a mock that always returns the same behavior
    pub fn constant(id: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            available: AtomicBool::new(true),
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: behavior,
            calls: AtomicUsize::new(0),
            health_checks: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(id: impl Into<String>, behaviors: Vec<MockBehavior>) -> Self {
        let mock = Self::constant(id, MockBehavior::Text("(mock: sequence exhausted)".into()));
        if let Ok(mut queue) = mock.behaviors.lock() {
            queue.extend(behaviors);
        }
        mock
    }

    /// Mock that echoes the prompt back, tagged with its provider id.
    pub fn echo(id: impl Into<String>) -> Self {
        Self::constant(id, MockBehavior::Echo)
    }

    /// Mock whose health check always reports the provider as down.
    pub fn down(id: impl Into<String>) -> Self {
        let mock = Self::constant(id, MockBehavior::Error("should not be called".into()));
        mock.set_available(false);
        mock
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Push a behavior to the end of the script.
    pub fn push(&self, behavior: MockBehavior) {
        if let Ok(mut queue) = self.behaviors.lock() {
            queue.push_back(behavior);
        }
    }

    /// Number of completion calls made
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of availability checks made
    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_behavior(&self, request: &LlmRequest) -> MockBehavior {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        self.behaviors
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

fn text_stream(text: String, request: &LlmRequest) -> LlmStream {
    let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
    let usage = Usage {
        input_tokens: (prompt_chars / 4) as u32,
        output_tokens: (text.len() / 4) as u32,
    };
    Box::pin(stream! {
        // Stream text in chunks like a real LLM
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(20) {
            yield Ok(StreamDelta::Text(chunk.iter().collect()));
        }
        yield Ok(StreamDelta::Done { stop_reason: Some("end_turn".into()), usage: Some(usage) });
    })
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn health_check(&self) -> LlmResult<()> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LlmError::Unavailable(format!("{} is down", self.id)))
        }
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        match self.next_behavior(&request) {
            MockBehavior::Text(text) => Ok(text_stream(text, &request)),
            MockBehavior::Echo => {
                let text = format!("{}: {}", self.id, request.last_user_text().unwrap_or_default());
                Ok(text_stream(text, &request))
            }
            MockBehavior::Delayed { delay, text } => {
                cancellable(cancel.as_ref(), async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
                Ok(text_stream(text, &request))
            }
            MockBehavior::Error(msg) => Err(LlmError::RequestFailed(msg)),
            MockBehavior::RateLimited => Err(LlmError::RateLimited { retry_after_ms: 1_000 }),
            MockBehavior::Malformed => Ok(Box::pin(stream! {
                yield Ok(StreamDelta::Text("{\"trunc".into()));
                yield Err(LlmError::InvalidResponse("unexpected end of stream".into()));
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmMessage;

    fn req(text: &str) -> LlmRequest {
        LlmRequest { model: "m".into(), messages: vec![LlmMessage::user(text)], ..Default::default() }
    }

    #[tokio::test]
    async fn mock_text_response() {
        let mock = MockProvider::constant("p", MockBehavior::Text("hello world".into()));
        let c = mock.complete(req("x"), None).await.unwrap();
        assert_eq!(c.text, "hello world");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_sequence_exhaustion() {
        let mock = MockProvider::sequence(
            "p",
            vec![MockBehavior::Text("first".into()), MockBehavior::Text("second".into())],
        );
        assert_eq!(mock.complete(req("a"), None).await.unwrap().text, "first");
        assert_eq!(mock.complete(req("b"), None).await.unwrap().text, "second");
        let third = mock.complete(req("c"), None).await.unwrap().text;
        assert!(third.contains("sequence exhausted"));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn mock_echo_and_down() {
        let mock = MockProvider::echo("cloud");
        assert_eq!(mock.complete(req("ping"), None).await.unwrap().text, "cloud: ping");

        let down = MockProvider::down("local");
        assert!(matches!(down.health_check().await, Err(LlmError::Unavailable(_))));
        assert_eq!(down.health_check_count(), 1);
    }

    #[tokio::test]
    async fn mock_malformed_is_invalid_response() {
        let mock = MockProvider::constant("p", MockBehavior::Malformed);
        let err = mock.complete(req("x"), None).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn mock_delay_honors_cancellation() {
        let mock = MockProvider::constant(
            "p",
            MockBehavior::Delayed { delay: Duration::from_secs(30), text: "late".into() },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = mock.complete(req("x"), Some(cancel)).await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }
}
