//! In-memory [`KeyedStore`] implementation backed by [`DashMap`].
//!
//! `DashMap` shards its entries behind per-shard locks, so concurrent puts
//! and gets on the same key are serialized while unrelated keys proceed in
//! parallel. Concurrent writers to one id resolve as last-writer-wins.

use dashmap::DashMap;
use usersvc_core::KeyedStore;

/// Keyed in-memory store safe for concurrent use.
#[derive(Debug)]
pub struct HashMapStore<V> {
    entries: DashMap<String, V>,
}

impl<V> HashMapStore<V> {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for HashMapStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedStore<V> for HashMapStore<V>
where
    V: Clone + Send + Sync,
{
    fn put(&self, id: String, value: V) -> Option<V> {
        self.entries.insert(id, value)
    }

    fn get(&self, id: &str) -> Option<V> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn put_then_get() {
        let store = HashMapStore::new();
        assert!(store.put("a".to_string(), 1).is_none());
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_overwrites_and_returns_previous() {
        let store = HashMapStore::new();
        store.put("a".to_string(), 1);
        assert_eq!(store.put("a".to_string(), 2), Some(1));
        assert_eq!(store.get("a"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_key_returns_none() {
        let store: HashMapStore<u32> = HashMapStore::new();
        assert!(store.get("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let store = Arc::new(HashMapStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.put(format!("{t}-{i}"), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 2000);
    }
}
