//! Persisted record of delivered messages and the last-sent index derived from it

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persist::write_json_atomic;
use crate::policy::{leading_number, normalize};

/// One delivered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// On-disk entry: current objects or legacy bare strings
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Item(HistoryItem),
    Legacy(String),
}

/// Mapping from text to the most recent time it was sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastSentIndex {
    entries: HashMap<String, DateTime<Utc>>,
}

impl LastSentIndex {
    pub fn from_items(items: &[HistoryItem]) -> Self {
        let mut index = Self::default();
        for item in items {
            index.record(&item.text, item.sent_at);
        }
        index
    }

    pub fn get(&self, text: &str) -> Option<DateTime<Utc>> {
        self.entries.get(text).copied()
    }

    /// Record a send, keeping the later timestamp if the text is already known
    pub fn record(&mut self, text: &str, sent_at: DateTime<Utc>) {
        self.entries
            .entry(text.to_string())
            .and_modify(|at| *at = (*at).max(sent_at))
            .or_insert(sent_at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load history from `path`.
///
/// A missing or unparsable file yields an empty list. Legacy files holding
/// bare strings are upgraded in memory by stamping the current time.
pub fn load(path: &Path) -> Vec<HistoryItem> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No history file at {:?}, starting empty", path);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to read history file {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let entries: Vec<StoredEntry> = match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Ignoring unparsable history file {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let now = Utc::now();
    let mut upgraded = 0;
    let items: Vec<HistoryItem> = entries
        .into_iter()
        .map(|entry| match entry {
            StoredEntry::Item(item) => HistoryItem {
                text: normalize(&item.text),
                sent_at: item.sent_at,
            },
            StoredEntry::Legacy(text) => {
                upgraded += 1;
                HistoryItem {
                    text: normalize(&text),
                    sent_at: now,
                }
            }
        })
        .filter(|item| !item.text.is_empty())
        .collect();

    if upgraded > 0 {
        tracing::info!("Upgraded {} legacy history entries from {:?}", upgraded, path);
    }
    tracing::debug!("Loaded {} history entries from {:?}", items.len(), path);
    items
}

/// Durable, size-capped list of delivered messages.
///
/// Owned by the engine alone. Every mutation is written through to disk.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    items: Vec<HistoryItem>,
    index: LastSentIndex,
    dirty: bool,
}

impl HistoryStore {
    /// Open the store, loading whatever is on disk
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = load(&path);
        let index = LastSentIndex::from_items(&items);
        Self {
            path,
            items,
            index,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_sent(&self) -> &LastSentIndex {
        &self.index
    }

    /// Leading number of the most recently sent item
    pub fn latest_leading_number(&self) -> Option<u64> {
        self.items.last().and_then(|item| leading_number(&item.text))
    }

    /// True when the last save failed and the file is behind memory
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Append a delivered message and persist.
    ///
    /// The in-memory list and index are updated even if the write fails.
    pub fn append(&mut self, text: &str, sent_at: DateTime<Utc>) -> crate::Result<()> {
        self.items.push(HistoryItem {
            text: text.to_string(),
            sent_at,
        });
        self.index.record(text, sent_at);
        self.save()
    }

    /// Drop the oldest entries until at most `max_history` remain.
    ///
    /// Returns whether anything was dropped. Persists and rebuilds the index
    /// when it was.
    pub fn truncate(&mut self, max_history: usize) -> crate::Result<bool> {
        if self.items.len() <= max_history {
            return Ok(false);
        }
        let excess = self.items.len() - max_history;
        self.items.drain(..excess);
        self.index = LastSentIndex::from_items(&self.items);
        tracing::debug!("Truncated history by {} entries to {}", excess, max_history);
        self.save()?;
        Ok(true)
    }

    /// Atomically write the full list to disk
    pub fn save(&mut self) -> crate::Result<()> {
        match write_json_atomic(&self.path, &self.items) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }
}
