//! In-memory result cache with single-flight computation.
//!
//! One coarse `RwLock` guards the whole map. Hits only take the shared lock.
//! A miss takes the exclusive lock, re-checks, and runs the computation while
//! still holding it, so a key is never computed twice concurrently. The
//! price is that every other key waits behind an in-flight computation.

pub mod key;

pub use key::{CacheKey, Discriminator};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Map of cache keys to computed values.
pub struct SingleflightCache<V> {
    entries: RwLock<HashMap<CacheKey, Arc<V>>>,
}

impl<V> SingleflightCache<V> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Only successful results are stored. A failed computation leaves the
    /// key empty, so the next call computes again.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        {
            let entries = self.entries.read().await;
            if let Some(value) = entries.get(key) {
                tracing::debug!(db_type = key.db_type(), key = %key.fingerprint(), "got existing database from cache");
                return Ok(Arc::clone(value));
            }
        }

        let mut entries = self.entries.write().await;
        if let Some(value) = entries.get(key) {
            tracing::debug!(db_type = key.db_type(), key = %key.fingerprint(), "got existing database from cache");
            return Ok(Arc::clone(value));
        }

        tracing::info!(
            db_type = key.db_type(),
            key = %key.fingerprint(),
            classifier = key.classifier(),
            "computing database for cache miss"
        );

        match compute().await {
            Ok(value) => {
                let value = Arc::new(value);
                entries.insert(key.clone(), Arc::clone(&value));
                Ok(value)
            }
            Err(err) => {
                tracing::error!(
                    db_type = key.db_type(),
                    key = %key.fingerprint(),
                    error = %err,
                    "error during call db request to dbaas"
                );
                Err(err)
            }
        }
    }

    /// Remove the entry for `key`. Returns whether an entry was present.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).is_some();
        tracing::info!(db_type = key.db_type(), key = %key.fingerprint(), removed, "delete database from cache");
        removed
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl<V> Default for SingleflightCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for SingleflightCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.try_read().map(|e| e.len()).ok();
        f.debug_struct("SingleflightCache").field("len", &len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(name: &str) -> CacheKey {
        CacheKey::new("postgresql", &Classifier::service(name, "ns"))
    }

    #[tokio::test]
    async fn test_adds_new_value() {
        let cache: SingleflightCache<String> = SingleflightCache::new();
        let value = cache.get_or_compute(&key("svc"), || async { Ok::<_, String>("db-123".to_string()) }).await.unwrap();

        assert_eq!(*value, "db-123");
        assert!(cache.contains(&key("svc")).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_returns_cached_value_without_computing() {
        let cache: SingleflightCache<String> = SingleflightCache::new();
        cache.get_or_compute(&key("svc"), || async { Ok::<_, String>("first".to_string()) }).await.unwrap();

        let value = cache.get_or_compute(&key("svc"), || async { Ok::<_, String>("second".to_string()) }).await.unwrap();
        assert_eq!(*value, "first");
    }

    #[tokio::test]
    async fn test_error_is_not_cached() {
        let cache: SingleflightCache<String> = SingleflightCache::new();
        let result = cache.get_or_compute(&key("svc"), || async { Err::<String, _>("boom".to_string()) }).await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty().await);

        let value = cache.get_or_compute(&key("svc"), || async { Ok::<_, String>("second".to_string()) }).await.unwrap();
        assert_eq!(*value, "second");
    }

    #[tokio::test]
    async fn test_delete_forces_recompute() {
        let cache: SingleflightCache<usize> = SingleflightCache::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) };

        assert_eq!(*cache.get_or_compute(&key("svc"), compute).await.unwrap(), 0);
        assert!(cache.delete(&key("svc")).await);
        assert!(!cache.delete(&key("svc")).await);
        assert_eq!(*cache.get_or_compute(&key("svc"), compute).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache: Arc<SingleflightCache<String>> = Arc::new(SingleflightCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute(&key("svc"), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, String>("shared".to_string())
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_flight_computation_blocks_other_keys() {
        let cache: Arc<SingleflightCache<String>> = Arc::new(SingleflightCache::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&key("slow"), || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, String>("slow".to_string())
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), cache.contains(&key("other"))).await;
        assert!(blocked.is_err());

        release_tx.send(()).unwrap();
        assert_eq!(*slow.await.unwrap().unwrap(), "slow");
        assert!(!cache.contains(&key("other")).await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache: SingleflightCache<String> = SingleflightCache::new();
        cache.get_or_compute(&key("a"), || async { Ok::<_, String>("a".to_string()) }).await.unwrap();
        cache.get_or_compute(&key("b"), || async { Ok::<_, String>("b".to_string()) }).await.unwrap();
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert!(cache.get(&key("a")).await.is_none());
    }
}
