//! Consciousness engine
//!
//! Wraps the coordinator with per-session state. One call to
//! [`Consciousness::handle`] is one turn:
//!
//! ```text
//! IDLE -> PROCESSING   recall memory, append the user turn, run the coordinator
//! PROCESSING -> IDLE   append the answer (or the failure), update mood, persist
//!            \-> REFLECTING -> IDLE   when the conversation is long or old enough
//! ```
//!
//! Every turn ends in IDLE, whatever the coordinator or the summarizer did.

use crate::config::EngineConfig;
use crate::error::ConsciousnessError;
use crate::memory::{importance, EpisodicMemory, Turn};
use crate::mood::{MoodSignal, MoodSnapshot};
use crate::reflection::{transcript, Summarizer};
use crate::retrieval::{NoopRetriever, Passage, Retriever};
use crate::session::SessionManager;
use crate::state::{ConsciousnessState, Phase};
use crate::store::{InMemoryMemoryStore, InMemoryStateStore, MemoryStore, StateStore};
use chrono::Utc;
use cortex_agent::{Coordinator, CoordinatorError, CoordinatorResponse, FailureStage, Task};
use cortex_core::SessionKey;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Successful turn.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub session: SessionKey,
    pub content: String,
    /// Agents that contributed, in invocation order.
    pub agents: Vec<String>,
    pub metadata: Map<String, Value>,
    /// This turn ended with a reflection that wrote episodic memories.
    pub reflected: bool,
    pub mood: MoodSnapshot,
    /// Passages plus episodic memories added as context.
    pub recalled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Routing,
    Agent,
    Coordination,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnStage::Routing => "routing",
            TurnStage::Agent => "agent",
            TurnStage::Coordination => "coordination",
        })
    }
}

impl From<FailureStage> for TurnStage {
    fn from(stage: FailureStage) -> Self {
        match stage {
            FailureStage::Routing => TurnStage::Routing,
            FailureStage::Agent | FailureStage::Timeout | FailureStage::Cancelled => TurnStage::Agent,
        }
    }
}

/// Failed turn, as shown to the caller. The session state has still moved
/// back to idle and recorded the failure.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{stage} failed: {message}")]
pub struct TurnFailure {
    pub session: SessionKey,
    pub stage: TurnStage,
    pub message: String,
    /// Output produced before a sequential workflow aborted.
    pub partial: Option<String>,
}

struct Answer {
    content: String,
    agents: Vec<String>,
    metadata: Map<String, Value>,
    single_agent: bool,
}

#[derive(Default)]
struct Recall {
    passages: Vec<Passage>,
    memories: Vec<EpisodicMemory>,
}

impl Recall {
    fn len(&self) -> usize {
        self.passages.len() + self.memories.len()
    }
}

fn answer_from(
    session: &SessionKey,
    outcome: Result<CoordinatorResponse, CoordinatorError>,
) -> Result<Answer, TurnFailure> {
    let fail = |stage: TurnStage, message: String, partial: Option<String>| TurnFailure {
        session: session.clone(),
        stage,
        message,
        partial,
    };

    match outcome {
        Ok(response) => {
            if let Some(failure) = response.failure() {
                return Err(fail(failure.stage.into(), failure.message.clone(), None));
            }
            Ok(Answer {
                content: response.content().to_string(),
                agents: response.agents().into_iter().map(String::from).collect(),
                metadata: response.metadata(),
                single_agent: matches!(response, CoordinatorResponse::Single(_)),
            })
        }
        Err(CoordinatorError::SequenceAborted { partial, failed }) => {
            let (stage, reason) = match &failed.error {
                Some(f) => (f.stage.into(), f.message.clone()),
                None => (TurnStage::Agent, "no output".to_string()),
            };
            let message = format!("sequence aborted at {}: {}", failed.agent, reason);
            Err(fail(stage, message, partial.last().map(|r| r.content.clone())))
        }
        Err(e) => Err(fail(TurnStage::Coordination, e.to_string(), None)),
    }
}

const ABANDONED: &str = "cancelled";

/// Session state locked for one turn. If the turn's future is dropped before
/// it settles, the live state still returns to idle, and a user turn left
/// without an answer gets a failed reply. The next completed turn persists it.
struct TurnGuard<'a> {
    state: MutexGuard<'a, ConsciousnessState>,
    /// The user turn has its answer (or failure) recorded.
    settled: bool,
}

impl<'a> TurnGuard<'a> {
    fn new(state: MutexGuard<'a, ConsciousnessState>) -> Self {
        Self { state, settled: false }
    }
}

impl Deref for TurnGuard<'_> {
    type Target = ConsciousnessState;

    fn deref(&self) -> &ConsciousnessState {
        &self.state
    }
}

impl DerefMut for TurnGuard<'_> {
    fn deref_mut(&mut self) -> &mut ConsciousnessState {
        &mut self.state
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.state.phase == Phase::Idle {
            return;
        }
        warn!(session = %self.state.session, phase = ?self.state.phase, "turn abandoned, returning to idle");
        if !self.settled {
            self.state.conversation.push(Turn::failure(ABANDONED));
            self.state.last_error = Some(ABANDONED.to_string());
        }
        self.state.phase = Phase::Idle;
    }
}

pub struct Consciousness {
    coordinator: Arc<Coordinator>,
    summarizer: Arc<dyn Summarizer>,
    retriever: Arc<dyn Retriever>,
    memories: Arc<dyn MemoryStore>,
    sessions: SessionManager,
    config: EngineConfig,
}

impl Consciousness {
    /// Engine with in-memory stores and no retrieval.
    pub fn new(coordinator: Arc<Coordinator>, summarizer: Arc<dyn Summarizer>, config: EngineConfig) -> Self {
        Self {
            coordinator,
            summarizer,
            retriever: Arc::new(NoopRetriever),
            memories: Arc::new(InMemoryMemoryStore::new()),
            sessions: SessionManager::new(Arc::new(InMemoryStateStore::new()), config.max_turns),
            config,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_memory_store(mut self, memories: Arc<dyn MemoryStore>) -> Self {
        self.memories = memories;
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.sessions = SessionManager::new(store, self.config.max_turns);
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn memories(&self) -> &Arc<dyn MemoryStore> {
        &self.memories
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one turn for `session`.
    pub async fn handle(
        &self,
        session: &SessionKey,
        user_text: &str,
        context: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Reply, TurnFailure> {
        let started = Instant::now();
        if let Some(idle) = self.config.session_idle() {
            self.sessions.evict_idle(idle);
        }
        let slot = self.sessions.slot(session).await;
        let mut state = TurnGuard::new(slot.lock().await);

        // IDLE -> PROCESSING
        state.phase = Phase::Processing;
        state.turn_count += 1;
        state.record_topics(user_text, self.config.max_topics);
        debug!(session = %session, turn = state.turn_count, "processing");

        let recall = self.recall(session, user_text).await;
        let mut task = Task::new(user_text);
        task.context = self.context_block(&state, &recall, context.as_deref());
        state.conversation.push(Turn::user(user_text));

        let outcome = self.coordinator.execute(task, cancel).await;
        let result = answer_from(session, outcome);

        // PROCESSING -> IDLE | REFLECTING
        let signal = match &result {
            Ok(answer) => {
                state.conversation.push(Turn::assistant(answer.content.clone()));
                state.last_error = None;
                MoodSignal { text: &answer.content, single_agent: answer.single_agent }
            }
            Err(failure) => {
                warn!(session = %session, stage = %failure.stage, error = %failure.message, "turn failed");
                state.conversation.push(Turn::failure(failure.to_string()));
                state.last_error = Some(failure.to_string());
                MoodSignal { text: &failure.message, single_agent: false }
            }
        };
        state.settled = true;
        state.mood.update(signal, self.config.mood_rate, self.config.arousal_length_scale);
        self.persist(&state).await;

        let mut reflected = false;
        let due = state.reflection_due(Utc::now(), self.config.reflect_after_turns, self.config.reflect_interval());
        if due && !cancel.is_cancelled() {
            state.phase = Phase::Reflecting;
            reflected = self.reflect(&mut state, cancel).await;
        }

        state.phase = Phase::Idle;
        self.persist(&state).await;

        info!(
            session = %session,
            ok = result.is_ok(),
            recalled = recall.len(),
            reflected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn complete"
        );

        let answer = result?;
        Ok(Reply {
            session: session.clone(),
            content: answer.content,
            agents: answer.agents,
            metadata: answer.metadata,
            reflected,
            mood: state.mood.snapshot(),
            recalled: recall.len(),
        })
    }

    /// Reflect now, regardless of the trigger. Returns whether episodic
    /// memories were written.
    pub async fn reflect_now(&self, session: &SessionKey, cancel: &CancellationToken) -> bool {
        let slot = self.sessions.slot(session).await;
        let mut state = TurnGuard::new(slot.lock().await);
        state.settled = true;
        state.phase = Phase::Reflecting;
        let reflected = self.reflect(&mut state, cancel).await;
        state.phase = Phase::Idle;
        self.persist(&state).await;
        reflected
    }

    /// Drop a session's state and its episodic memories.
    pub async fn forget(&self, session: &SessionKey) -> Result<(), ConsciousnessError> {
        self.sessions.forget(session).await?;
        self.memories.forget(session).await
    }

    async fn recall(&self, session: &SessionKey, user_text: &str) -> Recall {
        let top_k = self.config.top_k;
        if top_k == 0 {
            return Recall::default();
        }

        let passages = match self.retriever.search(user_text, top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(session = %session, error = %e, "retrieval failed, continuing without passages");
                Vec::new()
            }
        };

        let mut memories = match self.memories.query(session, user_text, top_k).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(session = %session, error = %e, "memory query failed, continuing without memories");
                Vec::new()
            }
        };
        if !memories.is_empty() {
            let now = Utc::now();
            for memory in &mut memories {
                memory.touch(now, self.config.importance_half_life_hours, self.config.recall_boost);
            }
            if let Err(e) = self.memories.upsert(&memories).await {
                warn!(session = %session, error = %e, "failed to record memory access");
            }
        }

        debug!(session = %session, passages = passages.len(), memories = memories.len(), "recalled");
        Recall { passages, memories }
    }

    fn context_block(&self, state: &ConsciousnessState, recall: &Recall, caller: Option<&str>) -> Option<String> {
        let mut blocks = Vec::new();

        if let Some(caller) = caller.map(str::trim).filter(|c| !c.is_empty()) {
            blocks.push(caller.to_string());
        }
        if !recall.memories.is_empty() {
            let lines: Vec<String> = recall.memories.iter().map(|m| format!("- {}", m.summary)).collect();
            blocks.push(format!("[Recalled memory]\n{}", lines.join("\n")));
        }
        if !recall.passages.is_empty() {
            let lines: Vec<String> = recall
                .passages
                .iter()
                .map(|p| match &p.source {
                    Some(source) => format!("- {} ({})", p.text.trim(), source),
                    None => format!("- {}", p.text.trim()),
                })
                .collect();
            blocks.push(format!("[Retrieved documents]\n{}", lines.join("\n")));
        }
        let history: Vec<Turn> = state.conversation.recent(self.config.history_turns).cloned().collect();
        if !history.is_empty() {
            blocks.push(format!("[Recent conversation]\n{}", transcript(&history)));
        }

        (!blocks.is_empty()).then(|| blocks.join("\n\n"))
    }

    /// REFLECTING: summarize the oldest turns into episodic memory, evict
    /// them, prune faded memories. On summarizer or store failure the turns
    /// stay put; `last_reflection` moves forward either way.
    async fn reflect(&self, state: &mut ConsciousnessState, cancel: &CancellationToken) -> bool {
        let now = Utc::now();
        state.last_reflection = now;

        let len = state.conversation.len();
        let retain = self.config.retain_turns;
        if len <= retain {
            debug!(session = %state.session, turns = len, "nothing to reflect on");
            return false;
        }

        let oldest: Vec<Turn> = state.conversation.iter().take(len - retain).cloned().collect();
        let mut records = Vec::new();
        for chunk in oldest.chunks(self.config.reflection_chunk_turns.max(1)) {
            match self.summarizer.summarize(chunk, cancel).await {
                Ok(summary) => {
                    let score = importance(&transcript(chunk));
                    records.push(EpisodicMemory::new(state.session.clone(), summary, score));
                }
                Err(e) => {
                    warn!(session = %state.session, error = %e, "reflection skipped, keeping turns");
                    return false;
                }
            }
        }

        if let Err(e) = self.memories.upsert(&records).await {
            warn!(session = %state.session, error = %e, "reflection skipped, memory store failed");
            return false;
        }

        let evicted = state.conversation.drain_oldest(oldest.len()).len();
        let pruned = self
            .memories
            .prune(
                &state.session,
                self.config.retention_threshold,
                self.config.importance_half_life_hours,
                now,
            )
            .await
            .unwrap_or_else(|e| {
                warn!(session = %state.session, error = %e, "prune failed");
                0
            });

        info!(
            session = %state.session,
            memories = records.len(),
            evicted,
            pruned,
            remaining = state.conversation.len(),
            "reflected"
        );
        true
    }

    async fn persist(&self, state: &ConsciousnessState) {
        if let Err(e) = self.sessions.store().save(state).await {
            warn!(session = %state.session, error = %e, "failed to persist session state");
        }
    }
}
