//! Per-key serialization.
//!
//! A `KeyedMutex` hands out one async mutex per key, created lazily and
//! dropped again once nobody holds or waits on it. Bid admission uses it
//! to serialize placements per account, so two concurrent bids from the
//! same account cannot both read the old reservation before either
//! writes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

pub struct KeyedMutex<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        KeyedMutex {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`. The returned guard releases
    /// it on drop.
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            // Opportunistic cleanup of keys nobody references anymore.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedMutex::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&"alice").await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_run_concurrently() {
        let locks = Arc::new(KeyedMutex::new());

        let _alice = locks.acquire(&"alice").await;
        // A different key must not block behind alice's guard.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&"bob"),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_cleaned_up() {
        let locks = KeyedMutex::new();
        {
            let _guard = locks.acquire(&"alice").await;
            assert_eq!(locks.len(), 1);
        }
        // Next acquire sweeps the idle entry before inserting its own.
        let _guard = locks.acquire(&"bob").await;
        assert_eq!(locks.len(), 1);
    }
}
