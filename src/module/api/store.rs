//! Type-erased shared tables backing `core` and `hold`
//!
//! Both stores map a name to an `Arc<dyn Any>`; callers recover the concrete
//! type with `get::<T>()`. Locks are held only for the map operation itself,
//! never while a stored value is used.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Entry = Arc<dyn Any + Send + Sync>;

/// Shared name -> value table
#[derive(Clone, Default)]
pub(crate) struct SharedTable {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SharedTable {
    pub(crate) fn insert<T: Any + Send + Sync>(&self, name: &str, value: T) -> Option<Entry> {
        self.insert_arc(name, Arc::new(value))
    }

    pub(crate) fn insert_arc<T: Any + Send + Sync>(&self, name: &str, value: Arc<T>) -> Option<Entry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value)
    }

    pub(crate) fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        entry.downcast::<T>().ok()
    }

    pub(crate) fn get_or_insert_with<T, F>(&self, name: &str, init: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| -> Entry { Arc::new(init()) })
            .clone();
        drop(entries);
        entry.downcast::<T>().ok()
    }

    pub(crate) fn remove(&self, name: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
