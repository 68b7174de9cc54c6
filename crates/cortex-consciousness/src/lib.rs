//! Cortex Consciousness - stateful sessions around the agent coordinator
//!
//! - Conversation memory: bounded per-session transcript
//! - Episodic memory: reflection summaries with decaying importance
//! - Mood: valence/arousal/focus nudged each turn
//! - Engine: IDLE -> PROCESSING -> (REFLECTING) -> IDLE, one turn at a time per session
//!
//! Retrieval, memory storage and state storage are traits so deployments can
//! plug in their own backends.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod mood;
pub mod reflection;
pub mod retrieval;
pub mod session;
pub mod state;
pub mod store;

pub use config::{CortexConfig, EngineConfig};
pub use engine::{Consciousness, Reply, TurnFailure, TurnStage};
pub use error::{ConsciousnessError, Result};
pub use memory::{importance, ConversationMemory, EpisodicMemory, Turn};
pub use mood::{sentiment, Mood, MoodLabel, MoodSignal, MoodSnapshot};
pub use reflection::{transcript, RouterSummarizer, Summarizer};
pub use retrieval::{Artifact, Modality, NoopRetriever, Passage, Renderer, Retriever, StaticRetriever, TextRenderer};
pub use session::{SessionManager, SessionSlot};
pub use state::{ConsciousnessState, Phase, SessionSummary};
pub use store::{InMemoryMemoryStore, InMemoryStateStore, JsonFileMemoryStore, JsonFileStateStore, MemoryStore, StateStore};
