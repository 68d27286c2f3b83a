//! Per-key async mutual exclusion

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// A lazily populated table of async mutexes, one per key.
///
/// Holding the guard returned by [`lock`](Self::lock) serializes every other
/// caller asking for the same key, while different keys proceed in parallel.
pub struct KeyedLocks<K> {
    inner: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let handle = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(map.entry(key.clone()).or_default())
        };
        handle.lock_owned().await
    }

    /// Take the lock for `key` only if nobody holds it
    pub fn try_lock(&self, key: &K) -> Option<OwnedMutexGuard<()>> {
        let handle = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(map.entry(key.clone()).or_default())
        };
        handle.try_lock_owned().ok()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks: KeyedLocks<String> = KeyedLocks::new();
        let guard = locks.lock(&"a".to_string()).await;
        assert!(locks.try_lock(&"a".to_string()).is_none());
        assert!(locks.try_lock(&"b".to_string()).is_some());
        drop(guard);
        assert!(locks.try_lock(&"a".to_string()).is_some());
    }
}
