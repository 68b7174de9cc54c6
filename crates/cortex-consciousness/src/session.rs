//! Live sessions
//!
//! Each session's state sits behind its own async mutex. The engine holds
//! that lock for a whole turn, so turns of one session run one at a time
//! while different sessions never contend. Sessions left idle can be
//! evicted; their state is already in the store and hydrates again on use.

use crate::error::Result;
use crate::state::{ConsciousnessState, Phase, SessionSummary};
use crate::store::StateStore;
use cortex_core::SessionKey;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type SessionSlot = Arc<Mutex<ConsciousnessState>>;

pub struct SessionManager {
    sessions: DashMap<SessionKey, SessionSlot>,
    last_used: DashMap<SessionKey, Instant>,
    store: Arc<dyn StateStore>,
    max_turns: usize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn StateStore>, max_turns: usize) -> Self {
        Self { sessions: DashMap::new(), last_used: DashMap::new(), store, max_turns }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// The session's slot, hydrated from the store on first use.
    pub async fn slot(&self, session: &SessionKey) -> SessionSlot {
        self.last_used.insert(session.clone(), Instant::now());
        if let Some(slot) = self.sessions.get(session) {
            return Arc::clone(slot.value());
        }

        let state = self.hydrate(session).await;
        // another task may have hydrated the same session meanwhile; first one wins
        Arc::clone(
            self.sessions
                .entry(session.clone())
                .or_insert_with(|| Arc::new(Mutex::new(state)))
                .value(),
        )
    }

    async fn hydrate(&self, session: &SessionKey) -> ConsciousnessState {
        match self.store.load(session).await {
            Ok(Some(mut state)) => {
                if state.phase != Phase::Idle {
                    warn!(session = %session, phase = ?state.phase, "recovered mid-transition, resetting to idle");
                    state.phase = Phase::Idle;
                }
                state.conversation.set_max_turns(self.max_turns);
                info!(session = %session, turns = state.conversation.len(), "hydrated session");
                state
            }
            Ok(None) => ConsciousnessState::new(session.clone(), self.max_turns),
            Err(e) => {
                warn!(session = %session, error = %e, "failed to load session state, starting fresh");
                ConsciousnessState::new(session.clone(), self.max_turns)
            }
        }
    }

    /// Live sessions plus any the store knows about.
    pub async fn list(&self) -> Result<Vec<SessionKey>> {
        let mut keys = self.store.list().await?;
        keys.extend(self.sessions.iter().map(|e| e.key().clone()));
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Copy of the session's state. Waits for any in-flight turn.
    pub async fn snapshot(&self, session: &SessionKey) -> Option<ConsciousnessState> {
        let slot = self.sessions.get(session).map(|s| Arc::clone(s.value()));
        match slot {
            Some(slot) => Some(slot.lock().await.clone()),
            None => self.store.load(session).await.ok().flatten(),
        }
    }

    pub async fn summary(&self, session: &SessionKey) -> Option<SessionSummary> {
        self.snapshot(session).await.map(|s| s.summary())
    }

    /// Clear conversation, mood and topics, keeping the session itself.
    pub async fn reset(&self, session: &SessionKey) -> Result<()> {
        let slot = self.slot(session).await;
        let mut state = slot.lock().await;
        *state = ConsciousnessState::new(session.clone(), self.max_turns);
        self.store.save(&state).await?;
        info!(session = %session, "session reset");
        Ok(())
    }

    /// Drop the session from memory and from the store.
    pub async fn forget(&self, session: &SessionKey) -> Result<()> {
        self.last_used.remove(session);
        if let Some((_, slot)) = self.sessions.remove(session) {
            // let an in-flight turn finish before its state disappears
            let _state = slot.lock().await;
        }
        self.store.delete(session).await?;
        info!(session = %session, "session forgotten");
        Ok(())
    }

    /// Drop live sessions untouched for at least `idle` that nobody holds.
    /// Returns how many were evicted.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.sessions.retain(|key, slot| {
            let recent = self
                .last_used
                .get(key)
                .is_some_and(|used| now.duration_since(*used.value()) < idle);
            // a clone outside the map means a turn or snapshot holds it
            let keep = recent || Arc::strong_count(slot) > 1 || slot.try_lock().is_err();
            if !keep {
                evicted += 1;
            }
            keep
        });
        self.last_used.retain(|key, _| self.sessions.contains_key(key));
        if evicted > 0 {
            debug!(evicted, live = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    pub fn live(&self) -> usize {
        self.sessions.len()
    }
}
