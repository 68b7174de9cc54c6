//! Core types for Cortex

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0.to_string()
    }
}

/// Message role
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// What kind of work an agent can take on.
///
/// Ordering is declaration order and is used wherever capabilities need a
/// stable iteration order (implicit sequential chains, listings).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Research,
    Code,
    Content,
    Vision,
    Memory,
    General,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Research,
        Capability::Code,
        Capability::Content,
        Capability::Vision,
        Capability::Memory,
        Capability::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Research => "research",
            Capability::Code => "code",
            Capability::Content => "content",
            Capability::Vision => "vision",
            Capability::Memory => "memory",
            Capability::General => "general",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownCapability(s.to_string()))
    }
}

/// Cost/latency/specialization class of language models.
///
/// `Local < Fast < Balanced < Smart` is a cost ordering. `Coding` and `Vision`
/// sit above it but are specializations, not strictly more expensive.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Fast,
    Balanced,
    Smart,
    Coding,
    Vision,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Local,
        Tier::Fast,
        Tier::Balanced,
        Tier::Smart,
        Tier::Coding,
        Tier::Vision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Fast => "fast",
            Tier::Balanced => "balanced",
            Tier::Smart => "smart",
            Tier::Coding => "coding",
            Tier::Vision => "vision",
        }
    }

    /// Tiers tried, in order, once every model of `self` has failed.
    ///
    /// Each chain is a fixed forward list so a routing attempt can never
    /// revisit a tier.
    pub fn escalation(&self) -> &'static [Tier] {
        match self {
            Tier::Local => &[Tier::Fast, Tier::Balanced, Tier::Smart],
            Tier::Fast => &[Tier::Balanced, Tier::Smart],
            Tier::Balanced => &[Tier::Smart],
            Tier::Smart => &[],
            Tier::Coding => &[Tier::Smart],
            Tier::Vision => &[],
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownTier(s.to_string()))
    }
}
