use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::workflows::WorkflowError;

/// A keyed collection of rows with its own identifier sequence.
///
/// Reads hand out clones so no lock outlives a call.
pub struct Table<K, V> {
    entity: &'static str,
    prefix: &'static str,
    sequence: AtomicU64,
    rows: RwLock<BTreeMap<K, V>>,
}

impl<K, V> Table<K, V>
where
    K: Ord + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(entity: &'static str, prefix: &'static str) -> Self {
        Self {
            entity,
            prefix,
            sequence: AtomicU64::new(0),
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Allocates the next identifier, e.g. `inq-000001`.
    pub fn next_key(&self) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{id:06}", self.prefix)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.rows.read().get(key).cloned()
    }

    pub fn require(&self, key: &K) -> Result<V, WorkflowError> {
        self.get(key)
            .ok_or_else(|| WorkflowError::not_found(self.entity, key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.read().contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.rows.write().insert(key, value);
    }

    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.rows.write().get_mut(key).map(f)
    }

    pub fn find(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<V> {
        self.rows
            .read()
            .values()
            .find(|row| predicate(row))
            .cloned()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&V) -> bool) -> Vec<V> {
        self.rows
            .read()
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub fn count(&self, mut predicate: impl FnMut(&V) -> bool) -> usize {
        self.rows
            .read()
            .values()
            .filter(|row| predicate(row))
            .count()
    }

    pub fn any(&self, mut predicate: impl FnMut(&V) -> bool) -> bool {
        self.rows.read().values().any(|row| predicate(row))
    }

    /// Runs `f` with exclusive access to every row, for mutations that must be
    /// observed all at once.
    pub fn mutate_all<R>(&self, f: impl FnOnce(&mut BTreeMap<K, V>) -> R) -> R {
        f(&mut self.rows.write())
    }
}
