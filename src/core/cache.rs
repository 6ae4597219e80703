//! Async in-memory cache for fetched price history.
//!
//! Providers key it by symbol and date range so repeated commands in one
//! process do not refetch. Nothing is persisted across runs.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

/// Cheaply cloneable handle to a shared key/value map. Reads take a shared
/// lock, so concurrent fetches for different symbols do not serialize on
/// cache lookups.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let value = self.entries.read().await.get(key).cloned();
        match value {
            Some(_) => debug!("Cache HIT"),
            None => debug!("Cache MISS"),
        }
        value
    }

    pub async fn put(&self, key: K, value: V) {
        self.entries.write().await.insert(key, value);
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = Cache::<String, Vec<f64>>::new();
        assert!(cache.get(&"AAPL:2024".to_string()).await.is_none());

        cache.put("AAPL:2024".to_string(), vec![1.0, 2.0]).await;
        assert_eq!(
            cache.get(&"AAPL:2024".to_string()).await,
            Some(vec![1.0, 2.0])
        );
        assert!(cache.get(&"MSFT:2024".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = Cache::<String, u32>::new();
        let clone = cache.clone();
        clone.put("k".to_string(), 7).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(7));
    }
}
