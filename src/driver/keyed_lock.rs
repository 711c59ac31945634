//! Per-partition-name async lock.
//!
//! Entries are held as `Weak` references and dropped from the map when the
//! last guard for a name goes away, so the map only ever holds names with
//! an operation in flight.

use std::hash::Hash;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap<K> = Arc<DashMap<K, Weak<Mutex<()>>>>;

/// Held while an operation on one key is in progress.
pub struct KeyedLockGuard<K>
where
    K: Hash + Eq + Clone,
{
    guard: Option<OwnedMutexGuard<()>>,
    arc: Arc<Mutex<()>>,
    key: K,
    locks: LockMap<K>,
}

impl<K> Drop for KeyedLockGuard<K>
where
    K: Hash + Eq + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only `self.arc` left: nobody holds or waits on this key.
        if Arc::strong_count(&self.arc) == 1 {
            self.locks
                .remove_if(&self.key, |_, weak| weak.as_ptr() == Arc::as_ptr(&self.arc));
        }
    }
}

/// Serializes operations per key; different keys proceed in parallel.
pub struct KeyedAsyncLock<K>
where
    K: Hash + Eq + Clone,
{
    locks: LockMap<K>,
}

impl<K> KeyedAsyncLock<K>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Wait until no other guard for `key` is alive and take it.
    pub async fn lock(&self, key: &K) -> KeyedLockGuard<K> {
        let arc = self.get_or_create(key);
        let guard = Arc::clone(&arc).lock_owned().await;
        KeyedLockGuard {
            guard: Some(guard),
            arc,
            key: key.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys with a live lock.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    fn get_or_create(&self, key: &K) -> Arc<Mutex<()>> {
        loop {
            match self.locks.entry(key.clone()) {
                Entry::Occupied(occupied) => {
                    if let Some(strong) = occupied.get().upgrade() {
                        return strong;
                    }
                    occupied.remove();
                }
                Entry::Vacant(vacant) => {
                    let strong = Arc::new(Mutex::new(()));
                    vacant.insert(Arc::downgrade(&strong));
                    return strong;
                }
            }
        }
    }
}

impl<K> Default for KeyedAsyncLock<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
