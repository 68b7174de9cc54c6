//! LLM Provider trait

use crate::types::{Completion, LlmRequest, StreamDelta};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types. Messages never carry credentials.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// Uniform interface to one model-serving backend.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider id used by the model catalog (e.g. "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Cheap availability check run before every routed call.
    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    /// Stream a completion response. If `cancel` is provided and triggered,
    /// the underlying HTTP connection is dropped and the stream yields `LlmError::Cancelled`.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream>;

    /// Run a request to completion, draining the stream.
    async fn complete(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<Completion> {
        let stream = self.complete_stream(request, cancel.clone()).await?;
        drain(stream, cancel).await
    }
}

/// Collect a delta stream into a [`Completion`].
pub async fn drain(mut stream: LlmStream, cancel: Option<CancellationToken>) -> LlmResult<Completion> {
    let cancel = cancel.unwrap_or_default();
    let mut completion = Completion::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            next = stream.next() => match next {
                Some(Ok(StreamDelta::Text(text))) => completion.text.push_str(&text),
                Some(Ok(StreamDelta::Done { stop_reason, usage })) => {
                    completion.stop_reason = stop_reason;
                    completion.usage = usage;
                    break;
                }
                Some(Ok(StreamDelta::Error(e))) => return Err(LlmError::StreamError(e)),
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
    }

    if completion.text.trim().is_empty() {
        return Err(LlmError::InvalidResponse("empty completion".into()));
    }
    Ok(completion)
}

/// Wrap a single completion as a two-item stream (text, done) for adapters
/// whose backend only answers in one piece.
pub fn single_shot(completion: Completion) -> LlmStream {
    Box::pin(async_stream::stream! {
        yield Ok(StreamDelta::Text(completion.text));
        yield Ok(StreamDelta::Done {
            stop_reason: completion.stop_reason,
            usage: completion.usage,
        });
    })
}

/// Race a future against an optional cancellation token.
pub async fn cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> LlmResult<T>
where
    F: Future<Output = LlmResult<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(LlmError::Cancelled),
            result = fut => result,
        },
        None => fut.await,
    }
}

/// Map a non-success HTTP status to an [`LlmError`] without echoing headers.
pub fn status_error(status: reqwest::StatusCode, body: &str, retry_after: Option<u64>) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after.map(|s| s * 1000).unwrap_or(60_000),
        },
        _ => {
            let snippet: String = body.chars().take(200).collect();
            LlmError::RequestFailed(format!("{}: {}", status, snippet))
        }
    }
}

/// Parse a `retry-after` header given in whole seconds.
pub fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
