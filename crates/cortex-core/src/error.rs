//! Error types for Cortex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("duplicate agent: {0}")]
    DuplicateAgent(String),

    #[error("agent {0} declares no capabilities")]
    EmptyCapabilities(String),

    #[error("duplicate model: {0}")]
    DuplicateModel(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
