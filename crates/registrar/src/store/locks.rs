use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// One mutex per key, created on first use and evicted once no caller holds
/// or waits on it.
///
/// Operations on different keys proceed independently; operations on the same
/// key run one at a time.
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with<R>(&self, key: K, f: impl FnOnce() -> R) -> R {
        // Clone the handle first so the map shard is released before blocking.
        let lock = Arc::clone(&*self.locks.entry(key.clone()).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Handles are only cloned under the shard lock, so a count of one means
        // nobody else can reach this mutex.
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Keys currently holding a mutex.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
