//! In-memory key-value store shared by every request handler on a node.
//!
//! A single `RwLock` guards the map: readers (`get`, `snapshot`, `size`) take
//! a shared lock, `put` takes an exclusive one. That is sufficient for the
//! target workload; per-key sharding is not warranted here.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Thread-safe in-memory mapping of string keys to string values.
#[derive(Default)]
pub struct Store {
    inner: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite `key` with `value`. Idempotent.
    pub async fn put(&self, key: String, value: String) {
        self.inner.write().await.insert(key, value);
    }

    /// Look up `key`. Returns `None` if absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    /// A consistent point-in-time copy of the whole mapping.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().await.clone()
    }

    /// Number of keys currently stored.
    pub async fn size(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = Store::new();
        store.put("a".to_string(), "1".to_string()).await;
        assert_eq!(store.get("a").await, Some("1".to_string()));
        assert_eq!(store.size().await, 1);
    }

    #[tokio::test]
    async fn get_absent_key_returns_none() {
        let store = Store::new();
        assert_eq!(store.get("ghost").await, None);
    }

    #[tokio::test]
    async fn put_is_idempotent_overwrite() {
        let store = Store::new();
        store.put("a".to_string(), "1".to_string()).await;
        store.put("a".to_string(), "2".to_string()).await;
        assert_eq!(store.get("a").await, Some("2".to_string()));
        assert_eq!(store.size().await, 1);
    }

    #[tokio::test]
    async fn snapshot_is_a_consistent_copy() {
        let store = Store::new();
        store.put("a".to_string(), "1".to_string()).await;
        store.put("b".to_string(), "2".to_string()).await;
        let snap = store.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("a"), Some(&"1".to_string()));
        store.put("c".to_string(), "3".to_string()).await;
        // The earlier snapshot does not observe the later write.
        assert_eq!(snap.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_puts_do_not_lose_writes() {
        let store = Arc::new(Store::new());
        let mut handles = Vec::new();
        for i in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put(format!("k{i}"), format!("v{i}")).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.size().await, 100);
        for i in 0..100 {
            assert_eq!(store.get(&format!("k{i}")).await, Some(format!("v{i}")));
        }
    }
}
