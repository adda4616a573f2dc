use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;

/// A generic in-memory CRUD store keyed by `K`, for test fixtures and mock
/// providers that need to look like a real backend without being one.
#[derive(Default)]
pub struct InMemoryCrudStore<K, V> {
    items: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryCrudStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, key: K, value: V) -> Option<V> {
        self.items.write().await.insert(key, value)
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.items.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        self.items.write().await.remove(key)
    }

    pub async fn list(&self) -> Vec<V> {
        self.items.read().await.values().cloned().collect()
    }

    /// All values for which `predicate` returns `true`.
    pub async fn filter(&self, predicate: impl Fn(&V) -> bool) -> Vec<V> {
        self.items
            .read()
            .await
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let store: InMemoryCrudStore<String, i32> = InMemoryCrudStore::new();
        store.insert("a".to_string(), 1).await;
        assert_eq!(store.get(&"a".to_string()).await, Some(1));
        assert_eq!(store.remove(&"a".to_string()).await, Some(1));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn filter_selects_matching_values() {
        let store: InMemoryCrudStore<u32, u32> = InMemoryCrudStore::new();
        for n in 0..5 {
            store.insert(n, n).await;
        }
        let evens = store.filter(|v| v % 2 == 0).await;
        assert_eq!(evens.len(), 3);
    }
}
