//! Per-session consciousness state

use crate::memory::ConversationMemory;
use crate::mood::{Mood, MoodSnapshot};
use chrono::{DateTime, Utc};
use cortex_core::SessionKey;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Processing,
    Reflecting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsciousnessState {
    pub session: SessionKey,
    pub phase: Phase,
    pub conversation: ConversationMemory,
    pub mood: Mood,
    pub last_reflection: DateTime<Utc>,
    pub turn_count: u64,
    /// Recently mentioned topics, newest last.
    #[serde(default)]
    pub topics: VecDeque<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl ConsciousnessState {
    pub fn new(session: SessionKey, max_turns: usize) -> Self {
        Self {
            session,
            phase: Phase::Idle,
            conversation: ConversationMemory::new(max_turns),
            mood: Mood::default(),
            last_reflection: Utc::now(),
            turn_count: 0,
            topics: VecDeque::new(),
            last_error: None,
        }
    }

    /// Note the topics of `text`. A repeated topic moves to the back.
    pub fn record_topics(&mut self, text: &str, max_topics: usize) {
        for word in crate::store::words(text).filter(|w| w.chars().count() >= 4) {
            if let Some(pos) = self.topics.iter().position(|t| *t == word) {
                self.topics.remove(pos);
            }
            self.topics.push_back(word);
        }
        while self.topics.len() > max_topics {
            self.topics.pop_front();
        }
    }

    /// Conversation is long enough, or the last reflection is old enough.
    pub fn reflection_due(&self, now: DateTime<Utc>, after_turns: usize, interval: Duration) -> bool {
        if self.conversation.len() >= after_turns {
            return true;
        }
        let since = (now - self.last_reflection).to_std().unwrap_or_default();
        since >= interval
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session: self.session.clone(),
            phase: self.phase,
            turns: self.conversation.len(),
            turn_count: self.turn_count,
            mood: self.mood.snapshot(),
            topics: self.topics.iter().cloned().collect(),
            last_reflection: self.last_reflection,
            last_error: self.last_error.clone(),
        }
    }
}

/// Serializable overview of a session, for listings and status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session: SessionKey,
    pub phase: Phase,
    pub turns: usize,
    pub turn_count: u64,
    pub mood: MoodSnapshot,
    pub topics: Vec<String>,
    pub last_reflection: DateTime<Utc>,
    pub last_error: Option<String>,
}
