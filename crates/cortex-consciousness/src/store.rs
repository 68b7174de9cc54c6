//! Persistence for episodic memory and session state
//!
//! Both stores come in an in-memory flavour and a JSON-file flavour. The file
//! stores keep one file per session and replace it atomically (write to a
//! temp file in the same directory, then rename).

use crate::error::Result;
use crate::memory::EpisodicMemory;
use crate::state::ConsciousnessState;
use chrono::{DateTime, Utc};
use cortex_core::SessionKey;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "this", "that", "have", "from", "they", "what",
    "when", "where", "which", "about", "would", "there", "their", "will", "been", "into", "just", "like", "some",
    "than", "then", "them", "these", "those", "could", "should", "please", "tell", "give", "make", "want", "need",
    "also", "here", "more", "very", "does", "doing", "done", "was", "were", "can", "how", "why", "who",
];

/// Lowercased content words of `text`, in order, with stopwords removed.
pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

pub(crate) fn terms(text: &str) -> BTreeSet<String> {
    words(text).collect()
}

#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or replace memories by id.
    async fn upsert(&self, memories: &[EpisodicMemory]) -> Result<()>;

    /// Up to `top_k` memories of `session` sharing words with `text`, by
    /// overlap then stored importance.
    async fn query(&self, session: &SessionKey, text: &str, top_k: usize) -> Result<Vec<EpisodicMemory>>;

    /// Drop memories whose decayed importance at `now` is below `threshold`.
    /// Returns how many were removed.
    async fn prune(&self, session: &SessionKey, threshold: f64, half_life_hours: f64, now: DateTime<Utc>)
        -> Result<usize>;

    /// Every memory of `session`.
    async fn all(&self, session: &SessionKey) -> Result<Vec<EpisodicMemory>>;

    /// Remove every memory of `session`.
    async fn forget(&self, session: &SessionKey) -> Result<()>;
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, state: &ConsciousnessState) -> Result<()>;
    async fn load(&self, session: &SessionKey) -> Result<Option<ConsciousnessState>>;
    async fn delete(&self, session: &SessionKey) -> Result<()>;
    async fn list(&self) -> Result<Vec<SessionKey>>;
}

// ============================================================
// Shared memory operations
// ============================================================

fn merge(existing: &mut Vec<EpisodicMemory>, incoming: &[EpisodicMemory]) {
    for memory in incoming {
        match existing.iter_mut().find(|m| m.id == memory.id) {
            Some(slot) => *slot = memory.clone(),
            None => existing.push(memory.clone()),
        }
    }
}

fn rank(memories: &[EpisodicMemory], text: &str, top_k: usize) -> Vec<EpisodicMemory> {
    let query = terms(text);
    let mut scored: Vec<(usize, &EpisodicMemory)> = memories
        .iter()
        .map(|m| (terms(&m.summary).intersection(&query).count(), m))
        .filter(|(overlap, _)| *overlap > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.importance.total_cmp(&a.1.importance)));
    scored.into_iter().take(top_k).map(|(_, m)| m.clone()).collect()
}

fn retain_important(memories: &mut Vec<EpisodicMemory>, threshold: f64, half_life_hours: f64, now: DateTime<Utc>) -> usize {
    let before = memories.len();
    memories.retain(|m| m.decayed_importance(now, half_life_hours) >= threshold);
    before - memories.len()
}

// ============================================================
// In-memory stores
// ============================================================

#[derive(Default)]
pub struct InMemoryMemoryStore {
    sessions: DashMap<SessionKey, Vec<EpisodicMemory>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn upsert(&self, memories: &[EpisodicMemory]) -> Result<()> {
        for memory in memories {
            let mut entry = self.sessions.entry(memory.session.clone()).or_default();
            merge(&mut entry, std::slice::from_ref(memory));
        }
        Ok(())
    }

    async fn query(&self, session: &SessionKey, text: &str, top_k: usize) -> Result<Vec<EpisodicMemory>> {
        Ok(self.sessions.get(session).map(|m| rank(&m, text, top_k)).unwrap_or_default())
    }

    async fn prune(&self, session: &SessionKey, threshold: f64, half_life_hours: f64, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .sessions
            .get_mut(session)
            .map(|mut m| retain_important(&mut m, threshold, half_life_hours, now))
            .unwrap_or(0))
    }

    async fn all(&self, session: &SessionKey) -> Result<Vec<EpisodicMemory>> {
        Ok(self.sessions.get(session).map(|m| m.value().clone()).unwrap_or_default())
    }

    async fn forget(&self, session: &SessionKey) -> Result<()> {
        self.sessions.remove(session);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    states: DashMap<SessionKey, ConsciousnessState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, state: &ConsciousnessState) -> Result<()> {
        self.states.insert(state.session.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, session: &SessionKey) -> Result<Option<ConsciousnessState>> {
        Ok(self.states.get(session).map(|s| s.value().clone()))
    }

    async fn delete(&self, session: &SessionKey) -> Result<()> {
        self.states.remove(session);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionKey>> {
        let mut keys: Vec<SessionKey> = self.states.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================
// JSON file stores
// ============================================================

/// File name for a session key. Anything outside `[A-Za-z0-9_-]` is
/// percent-encoded so distinct keys never share a file.
fn file_stem(session: &SessionKey) -> String {
    let mut out = String::with_capacity(session.as_str().len());
    for byte in session.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn session_from_stem(stem: &str) -> Option<SessionKey> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut chars = stem.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = std::str::from_utf8(&[hi, lo]).ok()?.to_string();
            bytes.push(u8::from_str_radix(&hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok().map(SessionKey::from)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp, json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    debug!(path = %path.display(), "wrote");
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Episodic memories as `<dir>/<session>.json`, one array per session.
pub struct JsonFileMemoryStore {
    dir: PathBuf,
    // read-modify-write of a session file
    write_lock: Mutex<()>,
}

impl JsonFileMemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), write_lock: Mutex::new(()) }
    }

    fn path(&self, session: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session)))
    }

    async fn read(&self, session: &SessionKey) -> Result<Vec<EpisodicMemory>> {
        Ok(read_json(&self.path(session)).await?.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl MemoryStore for JsonFileMemoryStore {
    async fn upsert(&self, memories: &[EpisodicMemory]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let sessions: BTreeSet<&SessionKey> = memories.iter().map(|m| &m.session).collect();
        for session in sessions {
            let mut existing = self.read(session).await?;
            let incoming: Vec<EpisodicMemory> = memories.iter().filter(|m| &m.session == session).cloned().collect();
            merge(&mut existing, &incoming);
            write_json_atomic(&self.path(session), &existing).await?;
        }
        Ok(())
    }

    async fn query(&self, session: &SessionKey, text: &str, top_k: usize) -> Result<Vec<EpisodicMemory>> {
        Ok(rank(&self.read(session).await?, text, top_k))
    }

    async fn prune(&self, session: &SessionKey, threshold: f64, half_life_hours: f64, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut memories = self.read(session).await?;
        let removed = retain_important(&mut memories, threshold, half_life_hours, now);
        if removed > 0 {
            write_json_atomic(&self.path(session), &memories).await?;
        }
        Ok(removed)
    }

    async fn all(&self, session: &SessionKey) -> Result<Vec<EpisodicMemory>> {
        self.read(session).await
    }

    async fn forget(&self, session: &SessionKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_present(&self.path(session)).await
    }
}

/// Session state as `<dir>/<session>.json`.
pub struct JsonFileStateStore {
    dir: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, session: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session)))
    }
}

#[async_trait::async_trait]
impl StateStore for JsonFileStateStore {
    async fn save(&self, state: &ConsciousnessState) -> Result<()> {
        write_json_atomic(&self.path(&state.session), state).await
    }

    async fn load(&self, session: &SessionKey) -> Result<Option<ConsciousnessState>> {
        read_json(&self.path(session)).await
    }

    async fn delete(&self, session: &SessionKey) -> Result<()> {
        remove_if_present(&self.path(session)).await
    }

    async fn list(&self) -> Result<Vec<SessionKey>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).and_then(session_from_stem) {
                Some(key) => keys.push(key),
                None => warn!(path = %path.display(), "skipping unrecognised state file"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
