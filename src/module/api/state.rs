//! State store (`hold`)
//!
//! Long-lived runtime data (rooms, connection sets, ban lists, counters).
//! The kernel never clears it; it is what survives code reloads.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::module::api::store::SharedTable;

/// Shared table of durable runtime state
#[derive(Clone, Default)]
pub struct StateStore {
    table: SharedTable,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing the previous one
    pub fn put<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.table.insert(key, value);
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.table.get(key)
    }

    /// Fetch a value, creating it on first use
    ///
    /// This is how modules seed state without wiping it on reload. Returns
    /// `None` only if the key already holds a value of a different type.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.table.get_or_insert_with(key, init)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.table.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.table.names()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore").field("keys", &self.keys()).finish()
    }
}
