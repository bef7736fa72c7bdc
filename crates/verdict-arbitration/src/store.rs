//! # Record Store
//!
//! Keyed in-memory records with per-record locking. Writers to different
//! keys never contend; a read-validate-update on one key runs entirely
//! under that key's shard lock, so there is no window between the check
//! and the write.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Thread-safe keyed store.
#[derive(Debug)]
pub struct Store<K: Eq + Hash, V> {
    data: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Store<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.insert(key, value)
    }

    /// Insert only if the key is absent. Returns `false` if it was taken.
    pub fn insert_new(&self, key: K, value: V) -> bool {
        match self.data.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Retrieve a record.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|v| v.value().clone())
    }

    /// All records, in no particular order.
    pub fn list(&self) -> Vec<V> {
        self.data.iter().map(|r| r.value().clone()).collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure may inspect the record, reject with `Err`, or mutate it
    /// and return `Ok`. A closure that returns `Err` must leave the record
    /// as it found it. Returns `None` if the key is absent.
    pub fn try_update<R, E>(&self, key: &K, f: impl FnOnce(&mut V) -> Result<R, E>) -> Option<Result<R, E>> {
        self.data.get_mut(key).map(|mut guard| f(guard.value_mut()))
    }

    /// Remove a record.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Remove a record if `pred` holds for it, under the key's lock.
    pub fn remove_if(&self, key: &K, pred: impl FnOnce(&V) -> bool) -> Option<V> {
        self.data.remove_if(key, |_, v| pred(v)).map(|(_, v)| v)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Store<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
