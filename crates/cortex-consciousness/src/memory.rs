//! Conversation and episodic memory
//!
//! Conversation memory is the bounded short-term transcript of a session.
//! Episodic memories are the long-term summaries that reflection distils
//! from it; their importance decays while they go unused.

use chrono::{DateTime, Utc};
use cortex_core::{Role, SessionKey};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set on assistant turns that record a failed request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), timestamp: Utc::now(), failed: false }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { failed: true, ..Self::new(Role::Assistant, message) }
    }

    /// `role: content`, one line per turn in transcripts.
    pub fn transcript_line(&self) -> String {
        if self.failed {
            format!("{} (failed): {}", self.role.as_str(), self.content)
        } else {
            format!("{}: {}", self.role.as_str(), self.content)
        }
    }
}

/// Short-term transcript, oldest first, never longer than `max_turns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self { turns: VecDeque::with_capacity(max_turns), max_turns }
    }

    /// Append a turn, evicting from the front to stay within bounds.
    /// Returns how many turns were evicted.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push_back(turn);
        let mut evicted = 0;
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Remove and return the `n` oldest turns.
    pub fn drain_oldest(&mut self, n: usize) -> Vec<Turn> {
        let n = n.min(self.turns.len());
        self.turns.drain(..n).collect()
    }

    /// The `n` newest turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Apply a new bound, evicting the oldest turns if it shrank.
    pub fn set_max_turns(&mut self, max_turns: usize) {
        self.max_turns = max_turns.max(1);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Long-term memory produced by reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub id: Uuid,
    pub session: SessionKey,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Stored importance as of `last_accessed`, in `[0, 1]`.
    pub importance: f64,
    /// Opaque handle into an external vector store.
    #[serde(default)]
    pub embedding_ref: Option<String>,
}

impl EpisodicMemory {
    pub fn new(session: SessionKey, summary: impl Into<String>, importance: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session,
            summary: summary.into(),
            created_at: now,
            last_accessed: now,
            importance: importance.clamp(0.0, 1.0),
            embedding_ref: None,
        }
    }

    /// Importance at `now`: halves every `half_life_hours` since last access.
    pub fn decayed_importance(&self, now: DateTime<Utc>, half_life_hours: f64) -> f64 {
        let idle_hours = (now - self.last_accessed).num_milliseconds().max(0) as f64 / 3_600_000.0;
        let factor = 0.5f64.powf(idle_hours / half_life_hours.max(f64::EPSILON));
        (self.importance * factor).clamp(0.0, 1.0)
    }

    /// Record a recall: settle the decay, add `boost`, reset the clock.
    pub fn touch(&mut self, now: DateTime<Utc>, half_life_hours: f64, boost: f64) {
        self.importance = (self.decayed_importance(now, half_life_hours) + boost).clamp(0.0, 1.0);
        self.last_accessed = now;
    }
}

const EMPHASIS: &[&str] = &["remember", "important", "don't forget", "do not forget", "always", "never"];

/// Deterministic importance score of a piece of conversation, in `[0, 1]`.
///
/// Starts at 0.3 and adds for named entities, explicit emphasis, numbers or
/// dates, and length (saturating at 200 words).
pub fn importance(text: &str) -> f64 {
    let mut score = 0.3;

    if has_named_entity(text) {
        score += 0.2;
    }

    let lower = text.to_lowercase();
    if text.contains('!') || EMPHASIS.iter().any(|w| contains_word(&lower, w)) {
        score += 0.25;
    }

    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 0.1;
    }

    let words = text.split_whitespace().count() as f64;
    score += 0.15 * (words / 200.0).min(1.0);

    score.clamp(0.0, 1.0)
}

/// A capitalised word that doesn't open a sentence. The pronoun "I" doesn't count.
fn has_named_entity(text: &str) -> bool {
    let mut sentence_start = true;
    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalised = word.chars().next().is_some_and(|c| c.is_uppercase());
        if capitalised && !sentence_start && word.len() > 1 {
            return true;
        }
        if !word.is_empty() {
            sentence_start = raw.ends_with(['.', '!', '?', ':']);
        }
    }
    false
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}
