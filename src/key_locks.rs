//! # Keyed Lock Registry Module
//!
//! Hands out one async mutex per key so that read-decide-write sequences for
//! the same `(user, category)` never interleave, while different keys proceed
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Thread-safe registry of per-key async mutexes
///
/// # Lock Lifecycle
///
/// - A mutex is created on the first request for a key
/// - Later requests for the same key share it
/// - [`KeyedLocks::prune`] drops mutexes nobody holds or waits on
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `key`
    ///
    /// The returned guard releases the key when dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks();
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    /// Drop mutexes that are neither held nor awaited, returning how many
    pub fn prune(&self) -> usize {
        let mut locks = self.locks();
        let before = locks.len();
        locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let removed = before - locks.len();
        if removed > 0 {
            debug!(removed, "Pruned idle key locks");
        }
        removed
    }

    /// Number of keys currently tracked
    pub fn lock_count(&self) -> usize {
        self.locks().len()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}
