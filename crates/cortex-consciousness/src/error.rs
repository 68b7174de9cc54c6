use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsciousnessError {
    /// Summarizing during reflection failed. Logged, never returned to callers.
    #[error("reflection failed: {0}")]
    ReflectionFailure(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("render error: {0}")]
    Render(String),
}

impl From<std::io::Error> for ConsciousnessError {
    fn from(e: std::io::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for ConsciousnessError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsciousnessError>;
