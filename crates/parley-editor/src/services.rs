//! External collaborators: script metadata and journal lookups.
//!
//! Both are read-only and may fail; failures degrade to empty results and a
//! warning, never to a refused edit. Script lookups run on background threads
//! and are merged back on the editing thread by
//! [`EditEngine::tick`](crate::engine::EditEngine::tick).

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parley_core::QuestRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("journal unavailable: {0}")]
    JournalUnavailable(String),
}

/// Parameter keys a script reads, each with values seen in other dialogues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptParameters {
    pub keys: IndexMap<String, Vec<String>>,
}

impl ScriptParameters {
    pub fn with_key(mut self, key: impl Into<String>, values: &[&str]) -> Self {
        self.keys
            .insert(key.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub trait ScriptMetadataSource: Send + Sync {
    fn parameters(&self, script: &str) -> Result<ScriptParameters, ServiceError>;
}

/// An in-memory script catalogue.
#[derive(Debug, Clone, Default)]
pub struct StaticScripts {
    scripts: HashMap<String, ScriptParameters>,
}

impl StaticScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, name: impl Into<String>, params: ScriptParameters) -> Self {
        self.scripts.insert(name.into(), params);
        self
    }
}

impl ScriptMetadataSource for StaticScripts {
    fn parameters(&self, script: &str) -> Result<ScriptParameters, ServiceError> {
        self.scripts
            .get(script)
            .cloned()
            .ok_or_else(|| ServiceError::ScriptNotFound(script.to_string()))
    }
}

/// Autocomplete cache fed by background lookups.
pub struct ScriptSuggestions {
    source: Arc<dyn ScriptMetadataSource>,
    cache: HashMap<String, ScriptParameters>,
    pending: HashSet<String>,
    tx: Sender<(String, ScriptParameters)>,
    rx: Receiver<(String, ScriptParameters)>,
}

impl std::fmt::Debug for ScriptSuggestions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptSuggestions")
            .field("cached", &self.cache.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl ScriptSuggestions {
    pub fn new(source: Arc<dyn ScriptMetadataSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        ScriptSuggestions {
            source,
            cache: HashMap::new(),
            pending: HashSet::new(),
            tx,
            rx,
        }
    }

    /// Starts a lookup for `script` unless it is cached or already running.
    /// Returns whether a lookup was started.
    pub fn request(&mut self, script: &str) -> bool {
        if script.is_empty() || self.cache.contains_key(script) || self.pending.contains(script) {
            return false;
        }
        self.pending.insert(script.to_string());
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let name = script.to_string();
        thread::spawn(move || {
            let params = match source.parameters(&name) {
                Ok(params) => params,
                Err(err) => {
                    tracing::warn!("script parameter lookup for {} failed: {}", name, err);
                    ScriptParameters::default()
                }
            };
            // The receiver is gone when the editor was dropped mid-lookup.
            let _ = tx.send((name, params));
        });
        true
    }

    /// Merges finished lookups into the cache. Returns how many arrived.
    pub fn drain(&mut self) -> usize {
        let mut merged = 0;
        while let Ok((name, params)) = self.rx.try_recv() {
            self.accept(name, params);
            merged += 1;
        }
        merged
    }

    /// Blocks until `script` has been looked up or `timeout` passes.
    pub fn wait_for(&mut self, script: &str, timeout: Duration) -> Option<&ScriptParameters> {
        let deadline = Instant::now() + timeout;
        while !self.cache.contains_key(script) && self.pending.contains(script) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok((name, params)) => self.accept(name, params),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.cache.get(script)
    }

    fn accept(&mut self, name: String, params: ScriptParameters) {
        self.pending.remove(&name);
        self.cache.insert(name, params);
    }

    pub fn get(&self, script: &str) -> Option<&ScriptParameters> {
        self.cache.get(script)
    }

    pub fn is_pending(&self, script: &str) -> bool {
        self.pending.contains(script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestInfo {
    pub name: String,
    pub entries: Vec<u32>,
}

pub trait JournalSource {
    /// `Ok(None)` when the journal has no quest with this tag.
    fn quest(&self, tag: &str) -> Result<Option<QuestInfo>, ServiceError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticJournal {
    quests: IndexMap<String, QuestInfo>,
}

impl StaticJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quest(mut self, tag: impl Into<String>, name: impl Into<String>, entries: &[u32]) -> Self {
        self.quests.insert(
            tag.into(),
            QuestInfo {
                name: name.into(),
                entries: entries.to_vec(),
            },
        );
        self
    }
}

impl JournalSource for StaticJournal {
    fn quest(&self, tag: &str) -> Result<Option<QuestInfo>, ServiceError> {
        Ok(self.quests.get(tag).cloned())
    }
}

/// Display-only validation of a node's quest reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QuestStatus {
    /// No journal is loaded for this module.
    NoJournal,
    UnknownQuest,
    Valid { name: String },
    InvalidEntry { name: String, entry: u32 },
    /// The journal could not be read.
    Unavailable,
}

pub fn quest_status(journal: Option<&dyn JournalSource>, quest: &QuestRef) -> QuestStatus {
    let Some(journal) = journal else {
        return QuestStatus::NoJournal;
    };
    match journal.quest(&quest.tag) {
        Ok(None) => QuestStatus::UnknownQuest,
        Ok(Some(info)) => match quest.entry {
            Some(entry) if !info.entries.contains(&entry) => QuestStatus::InvalidEntry {
                name: info.name,
                entry,
            },
            _ => QuestStatus::Valid { name: info.name },
        },
        Err(err) => {
            tracing::warn!("journal lookup for {} failed: {}", quest.tag, err);
            QuestStatus::Unavailable
        }
    }
}
