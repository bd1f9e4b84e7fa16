//! Per-key async mutual exclusion
//!
//! Hands out one `tokio::sync::Mutex` per key, created lazily. Holders of different keys
//! never contend; holders of the same key run one at a time in FIFO order.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the table grows past this many keys
const PRUNE_THRESHOLD: usize = 1024;

pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`; released when the guard drops
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().await;
            if table.len() > PRUNE_THRESHOLD {
                // Only the table itself references an idle lock
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table.entry(key).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Lock several keys without deadlocking against other multi-key holders.
    ///
    /// Keys are deduplicated and acquired in sorted order.
    pub async fn lock_many(&self, mut keys: Vec<K>) -> Vec<OwnedMutexGuard<()>>
    where
        K: Ord,
    {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::<(i64, i64)>::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock((1, 1)).await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<(i64, i64)>::new();
        let _a = locks.lock((1, 1)).await;

        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock((2, 1))).await;
        assert!(b.is_ok(), "lock on an unrelated key should not wait");
    }

    #[tokio::test]
    async fn test_lock_many_dedups() {
        let locks = KeyedLocks::<(i64, i64)>::new();
        let guards = locks.lock_many(vec![(2, 1), (1, 1), (2, 1)]).await;
        assert_eq!(guards.len(), 2);
        assert_eq!(locks.len().await, 2);
    }
}
