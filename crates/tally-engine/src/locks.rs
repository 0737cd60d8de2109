//! # Per-Entity Locks
//!
//! Exclusive access scopes keyed by entity, so credit-affecting work on one
//! customer (or edits to one sale) run one at a time while unrelated
//! customers proceed in parallel.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. sale:<id>        all sale keys, sorted                             │
//! │  2. customer:<id>    all customer keys, sorted                         │
//! │  3. db.begin()       only then take a connection                       │
//! │                                                                         │
//! │  Every operation acquires in this order, so waits never form a cycle   │
//! │  and no task waits on a lock while holding a pooled connection.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Key for a customer's credit scope.
pub fn customer_key(customer_id: &str) -> String {
    format!("customer:{customer_id}")
}

/// Key for a sale's edit scope.
pub fn sale_key(sale_id: &str) -> String {
    format!("sale:{sale_id}")
}

/// Hands out per-key async mutexes. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held locks. Released when dropped.
#[derive(Debug, Default)]
pub struct LockScope {
    guards: Vec<OwnedMutexGuard<()>>,
}

impl LockScope {
    /// Takes ownership of another scope's guards.
    pub fn extend(&mut self, other: LockScope) {
        self.guards.extend(other.guards);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl LockManager {
    pub fn new() -> Self {
        LockManager::default()
    }

    /// Acquires every key, in sorted order, duplicates collapsed.
    pub async fn acquire<I, S>(&self, keys: I) -> LockScope
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut scope = LockScope {
            guards: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let mutex = self.mutex_for(&key);
            trace!(key = %key, "Waiting for lock");
            scope.guards.push(mutex.lock_owned().await);
        }
        scope
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn mutex_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        // Entries only the map references are idle.
        locks.retain(|_, m| Arc::strong_count(m) > 1);

        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = LockManager::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _scope = locks.acquire([customer_key("c1")]).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = LockManager::new();
        let _a = locks.acquire([customer_key("a")]).await;

        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire([customer_key("b")]),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_duplicates_collapse_and_scopes_extend() {
        let locks = LockManager::new();
        let mut scope = locks.acquire([sale_key("s1"), sale_key("s1")]).await;
        assert_eq!(scope.len(), 1);

        scope.extend(locks.acquire([customer_key("c1"), customer_key("c2")]).await);
        assert_eq!(scope.len(), 3);
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = LockManager::new();
        drop(locks.acquire([customer_key("a"), customer_key("b")]).await);

        let _c = locks.acquire([customer_key("c")]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
