//! Tests for cortex-llm: request types, the provider trait defaults, and adapters

use cortex_llm::provider::{drain, single_shot};
use cortex_llm::*;
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert!(req.model.is_empty());
    assert!(req.messages.is_empty());
    assert_eq!(req.max_tokens, Some(2048));
    assert!(req.temperature.is_none());
    assert!(req.system.is_none());
}

#[test]
fn llm_request_prompt_and_for_model() {
    let req = LlmRequest::prompt("hello", Some("sys".into()));
    assert_eq!(req.messages, vec![LlmMessage::user("hello")]);
    let pinned = req.for_model("gpt-4o");
    assert_eq!(pinned.model, "gpt-4o");
    assert_eq!(pinned.system.as_deref(), Some("sys"));
    assert!(req.model.is_empty(), "original request is untouched");
}

#[test]
fn llm_request_last_user_text() {
    let req = LlmRequest {
        messages: vec![
            LlmMessage::user("first"),
            LlmMessage::assistant("reply"),
            LlmMessage::user("second"),
        ],
        ..Default::default()
    };
    assert_eq!(req.last_user_text(), Some("second"));
    assert_eq!(LlmRequest::default().last_user_text(), None);
}

#[test]
fn llm_request_serializes_without_empty_options() {
    let req = LlmRequest { model: "m".into(), max_tokens: None, ..Default::default() };
    let json = serde_json::to_string(&req).unwrap();
    assert!(!json.contains("max_tokens"));
    assert!(!json.contains("system"));
}

// ===========================================================================
// Usage / Completion
// ===========================================================================

#[test]
fn usage_total() {
    let u = Usage { input_tokens: 10, output_tokens: 5 };
    assert_eq!(u.total(), 15);
}

#[test]
fn usage_deserializes_partial() {
    let u: Usage = serde_json::from_str(r#"{"output_tokens":4}"#).unwrap();
    assert_eq!(u, Usage { input_tokens: 0, output_tokens: 4 });
}

// ===========================================================================
// Provider trait defaults
// ===========================================================================

#[tokio::test]
async fn drain_collects_single_shot() {
    let stream = single_shot(Completion {
        text: "abc".into(),
        usage: Some(Usage { input_tokens: 1, output_tokens: 1 }),
        stop_reason: Some("stop".into()),
    });
    let c = drain(stream, None).await.unwrap();
    assert_eq!(c.text, "abc");
    assert_eq!(c.stop_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn drain_rejects_blank_completion() {
    let stream = single_shot(Completion { text: "   ".into(), ..Default::default() });
    assert!(matches!(drain(stream, None).await, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn drain_stops_on_cancel() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let stream = single_shot(Completion { text: "abc".into(), ..Default::default() });
    assert!(matches!(drain(stream, Some(cancel)).await, Err(LlmError::Cancelled)));
}

#[tokio::test]
async fn provider_usable_as_trait_object() {
    let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::echo("mock"));
    assert_eq!(provider.name(), "mock");
    assert!(provider.health_check().await.is_ok());
    let c = provider.complete(LlmRequest::prompt("hi", None), None).await.unwrap();
    assert_eq!(c.text, "mock: hi");
    assert!(c.usage.is_some());
}

#[tokio::test]
async fn mock_rate_limit_and_error() {
    let mock = MockProvider::sequence(
        "p",
        vec![MockBehavior::RateLimited, MockBehavior::Error("boom".into())],
    );
    let first = mock.complete(LlmRequest::prompt("x", None), None).await.unwrap_err();
    assert!(matches!(first, LlmError::RateLimited { retry_after_ms: 1_000 }));
    let second = mock.complete(LlmRequest::prompt("x", None), None).await.unwrap_err();
    assert_eq!(second.to_string(), "request failed: boom");
}

#[tokio::test]
async fn mock_delayed_completes() {
    let mock = MockProvider::constant(
        "p",
        MockBehavior::Delayed { delay: Duration::from_millis(5), text: "done".into() },
    );
    let c = mock.complete(LlmRequest::prompt("x", None), None).await.unwrap();
    assert_eq!(c.text, "done");
}

#[tokio::test]
async fn mock_availability_toggle() {
    let mock = MockProvider::echo("p");
    mock.set_available(false);
    assert!(mock.health_check().await.is_err());
    mock.set_available(true);
    assert!(mock.health_check().await.is_ok());
    assert_eq!(mock.health_check_count(), 2);
}

// ===========================================================================
// Error display never carries credentials
// ===========================================================================

#[test]
fn auth_error_has_no_detail() {
    assert_eq!(LlmError::AuthFailed.to_string(), "authentication failed");
}

#[tokio::test]
async fn cloud_health_checks_require_keys() {
    assert!(AnthropicProvider::new("").health_check().await.is_err());
    assert!(OpenAiProvider::new("").health_check().await.is_err());
    assert!(OpenAiProvider::gemini("key").health_check().await.is_ok());
    assert_eq!(OpenAiProvider::gemini("key").name(), "gemini");
}
