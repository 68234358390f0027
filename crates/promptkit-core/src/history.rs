//! Variable usage history for auto-suggestions.
//!
//! History is kept behind the [`HistoryStore`] trait and injected into the
//! variable engine. Two implementations are provided: a purely in-memory one,
//! and one that persists the whole history as a single JSON blob in a
//! [`KvStore`].

use crate::storage::{self, KvStore};
use crate::types::VariableHistory;
use std::sync::{Mutex, PoisonError};

/// Default cap on remembered values per variable name.
pub const MAX_HISTORY_ITEMS: usize = 10;

/// Storage key used by [`KvHistoryStore`].
pub const HISTORY_STORAGE_KEY: &str = "variable-history";

/// Store of recently used values per variable name.
///
/// Implementations never fail: a history is a convenience for forms, so a
/// broken backend degrades to "no suggestions" instead of an error.
pub trait HistoryStore: Send + Sync {
    /// Returns the recorded values for `name`, most recent first.
    fn get(&self, name: &str) -> Vec<String>;

    /// Records `value` for `name`: moves it to the front (dropping an earlier
    /// occurrence) and keeps at most `max_entries` values.
    fn record(&self, name: &str, value: &str, max_entries: usize);

    /// Returns the complete history.
    fn snapshot(&self) -> VariableHistory;

    /// Replaces the complete history.
    fn replace(&self, history: VariableHistory);

    /// Forgets everything.
    fn clear(&self);
}

/// Applies the move-to-front, dedupe, and cap rules to one name's entries.
pub(crate) fn push_front_dedup(entries: &mut Vec<String>, value: &str, max_entries: usize) {
    entries.retain(|existing| existing != value);
    entries.insert(0, value.to_string());
    entries.truncate(max_entries);
}

/// In-memory history store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    history: Mutex<VariableHistory>,
}

impl MemoryHistoryStore {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn get(&self, name: &str) -> Vec<String> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.get(name).cloned().unwrap_or_default()
    }

    fn record(&self, name: &str, value: &str, max_entries: usize) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = history.entry(name.to_string()).or_default();
        push_front_dedup(entries, value, max_entries);
    }

    fn snapshot(&self) -> VariableHistory {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, history: VariableHistory) {
        *self.history.lock().unwrap_or_else(PoisonError::into_inner) = history;
    }

    fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// History store persisted as one JSON blob in a [`KvStore`].
///
/// Each mutation is a read-modify-write of the blob; the internal lock
/// serializes mutations made through the same instance.
#[derive(Debug)]
pub struct KvHistoryStore<S: KvStore> {
    store: S,
    lock: Mutex<()>,
}

impl<S: KvStore> KvHistoryStore<S> {
    /// Wraps a key-value store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> VariableHistory {
        storage::load_json_or_default(&self.store, HISTORY_STORAGE_KEY)
    }

    fn save(&self, history: &VariableHistory) {
        if let Err(e) = storage::save_json(&self.store, HISTORY_STORAGE_KEY, history) {
            tracing::warn!(error = %e, "failed to save variable history");
        }
    }
}

impl<S: KvStore> HistoryStore for KvHistoryStore<S> {
    fn get(&self, name: &str) -> Vec<String> {
        self.load().remove(name).unwrap_or_default()
    }

    fn record(&self, name: &str, value: &str, max_entries: usize) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut history = self.load();
        let entries = history.entry(name.to_string()).or_default();
        push_front_dedup(entries, value, max_entries);
        self.save(&history);
    }

    fn snapshot(&self) -> VariableHistory {
        self.load()
    }

    fn replace(&self, history: VariableHistory) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(&history);
    }

    fn clear(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.store.remove(HISTORY_STORAGE_KEY) {
            tracing::warn!(error = %e, "failed to clear variable history");
        }
    }
}
