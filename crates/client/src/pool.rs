//! Process-wide pool of logical databases.
//!
//! Create-or-get results are cached per (type, canonical classifier,
//! discriminator) so concurrent callers asking for the same database share a
//! single request to the agent. Connection lookups always go to the client.

use std::sync::Arc;

use dbaas_core::{
    AppConfig, BaseDbParams, CacheKey, Classifier, ConnectionProperties, Discriminator, Error, LogicalDb,
    SingleflightCache,
};

use crate::agent::{AgentClient, DbaasClient};
use crate::context::RequestContext;
use crate::provider::ProviderChain;
use crate::token::TokenProvider;

/// Cached front of a [`DbaasClient`].
pub struct DbaasPool {
    client: Arc<dyn DbaasClient>,
    cache: SingleflightCache<LogicalDb>,
}

impl DbaasPool {
    pub fn new(client: Arc<dyn DbaasClient>) -> Self {
        Self { client, cache: SingleflightCache::new() }
    }

    /// Build a pool over an [`AgentClient`] configured from `config`.
    pub fn from_config(
        config: &AppConfig, tokens: Arc<dyn TokenProvider>, providers: ProviderChain,
    ) -> Result<Self, Error> {
        let client = AgentClient::from_config(config, tokens)?.with_providers(providers);
        Ok(Self::new(Arc::new(client)))
    }

    /// Logical database for `classifier`, created on first use and cached.
    ///
    /// The cache key is built from the classifier as given, before the
    /// client enriches it with the namespace.
    pub async fn get_or_create_db(
        &self, ctx: &RequestContext, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Arc<LogicalDb>, Error> {
        let key = CacheKey::new(db_type, classifier);
        self.get_or_create_by_key(ctx, key, classifier, params).await
    }

    /// Same as [`get_or_create_db`](Self::get_or_create_db), with a
    /// discriminator separating otherwise identical requests in the cache.
    pub async fn get_or_create_db_with_discriminator<D: Discriminator + ?Sized>(
        &self, ctx: &RequestContext, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
        discriminator: &D,
    ) -> Result<Arc<LogicalDb>, Error> {
        let key = CacheKey::with_discriminator(db_type, classifier, discriminator);
        self.get_or_create_by_key(ctx, key, classifier, params).await
    }

    /// Connection properties for `classifier`; never cached.
    pub async fn get_connection(
        &self, ctx: &RequestContext, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<ConnectionProperties, Error> {
        self.client.get_connection(ctx, db_type, classifier.clone(), params).await
    }

    /// Forget the cached record, e.g. after the database was dropped.
    pub async fn evict(&self, db_type: &str, classifier: &Classifier) -> bool {
        self.cache.delete(&CacheKey::new(db_type, classifier)).await
    }

    pub async fn evict_with_discriminator<D: Discriminator + ?Sized>(
        &self, db_type: &str, classifier: &Classifier, discriminator: &D,
    ) -> bool {
        self.cache.delete(&CacheKey::with_discriminator(db_type, classifier, discriminator)).await
    }

    pub fn cache(&self) -> &SingleflightCache<LogicalDb> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<dyn DbaasClient> {
        &self.client
    }

    async fn get_or_create_by_key(
        &self, ctx: &RequestContext, key: CacheKey, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Arc<LogicalDb>, Error> {
        tracing::debug!(db_type = key.db_type(), key = %key.fingerprint(), "resolving logical database");
        self.cache
            .get_or_compute(&key, || self.client.get_or_create_db(ctx, key.db_type(), classifier.clone(), params))
            .await
    }
}

impl std::fmt::Debug for DbaasPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbaasPool").field("cache", &self.cache).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Client that counts calls and answers after a short delay.
    #[derive(Default)]
    struct CountingClient {
        creates: AtomicUsize,
        connections: AtomicUsize,
    }

    #[async_trait]
    impl DbaasClient for CountingClient {
        async fn get_or_create_db(
            &self, _ctx: &RequestContext, db_type: &str, classifier: Classifier, _params: &BaseDbParams,
        ) -> Result<LogicalDb, Error> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(LogicalDb { id: n.to_string(), classifier, db_type: db_type.into(), ..Default::default() })
        }

        async fn get_connection(
            &self, _ctx: &RequestContext, _db_type: &str, _classifier: Classifier, _params: &BaseDbParams,
        ) -> Result<ConnectionProperties, Error> {
            self.connections.fetch_add(1, Ordering::SeqCst);
            let mut props = ConnectionProperties::new();
            props.insert("password".into(), "qwerty".into());
            Ok(props)
        }
    }

    /// Client that always fails validation-style.
    struct RejectingClient;

    #[async_trait]
    impl DbaasClient for RejectingClient {
        async fn get_or_create_db(
            &self, _ctx: &RequestContext, _db_type: &str, _classifier: Classifier, _params: &BaseDbParams,
        ) -> Result<LogicalDb, Error> {
            Err(Error::InvalidClassifier("classifier can't be nil or empty".into()))
        }

        async fn get_connection(
            &self, _ctx: &RequestContext, _db_type: &str, _classifier: Classifier, _params: &BaseDbParams,
        ) -> Result<ConnectionProperties, Error> {
            Err(Error::Cancelled)
        }
    }

    fn pool() -> (Arc<CountingClient>, DbaasPool) {
        let client = Arc::new(CountingClient::default());
        let pool = DbaasPool::new(client.clone());
        (client, pool)
    }

    fn classifier() -> Classifier {
        Classifier::service("test_service", "test_namespace")
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let (client, pool) = pool();
        let ctx = RequestContext::new();

        let first = pool.get_or_create_db(&ctx, "postgresql", &classifier(), &BaseDbParams::default()).await.unwrap();
        let second = pool.get_or_create_db(&ctx, "postgresql", &classifier(), &BaseDbParams::default()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.creates.load(Ordering::SeqCst), 1);
        assert_eq!(pool.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let (client, pool) = pool();
        let pool = Arc::new(pool);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    pool.get_or_create_db(&RequestContext::new(), "postgresql", &classifier(), &BaseDbParams::default())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(client.creates.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|db| Arc::ptr_eq(db, &results[0])));
    }

    #[tokio::test]
    async fn test_key_order_does_not_matter() {
        let (client, pool) = pool();
        let ctx = RequestContext::new();
        let a = Classifier::new().with("microserviceName", "svc").with("scope", "service");
        let b = Classifier::new().with("scope", "service").with("microserviceName", "svc");

        pool.get_or_create_db(&ctx, "postgresql", &a, &BaseDbParams::default()).await.unwrap();
        pool.get_or_create_db(&ctx, "postgresql", &b, &BaseDbParams::default()).await.unwrap();
        assert_eq!(client.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discriminator_and_type_separate_entries() {
        let (client, pool) = pool();
        let ctx = RequestContext::new();
        let params = BaseDbParams::default();

        pool.get_or_create_db(&ctx, "postgresql", &classifier(), &params).await.unwrap();
        pool.get_or_create_db(&ctx, "mongodb", &classifier(), &params).await.unwrap();
        for _ in 0..2 {
            pool.get_or_create_db_with_discriminator(&ctx, "postgresql", &classifier(), &params, "ro").await.unwrap();
        }

        assert_eq!(client.creates.load(Ordering::SeqCst), 3);
        assert_eq!(pool.cache().len().await, 3);
    }

    #[tokio::test]
    async fn test_evict_forces_new_request() {
        let (client, pool) = pool();
        let ctx = RequestContext::new();
        let params = BaseDbParams::default();

        pool.get_or_create_db(&ctx, "postgresql", &classifier(), &params).await.unwrap();
        assert!(pool.evict("postgresql", &classifier()).await);
        assert!(!pool.evict("postgresql", &classifier()).await);

        let db = pool.get_or_create_db(&ctx, "postgresql", &classifier(), &params).await.unwrap();
        assert_eq!(db.id, "1");
        assert_eq!(client.creates.load(Ordering::SeqCst), 2);

        pool.get_or_create_db_with_discriminator(&ctx, "postgresql", &classifier(), &params, "x").await.unwrap();
        assert!(pool.evict_with_discriminator("postgresql", &classifier(), "x").await);
    }

    #[tokio::test]
    async fn test_get_connection_not_cached() {
        let (client, pool) = pool();
        let ctx = RequestContext::new();

        for _ in 0..3 {
            let props = pool.get_connection(&ctx, "postgresql", &classifier(), &BaseDbParams::default()).await.unwrap();
            assert_eq!(props["password"], "qwerty");
        }

        assert_eq!(client.connections.load(Ordering::SeqCst), 3);
        assert!(pool.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let pool = DbaasPool::new(Arc::new(RejectingClient));
        let ctx = RequestContext::new();

        let result = pool.get_or_create_db(&ctx, "postgresql", &Classifier::new(), &BaseDbParams::default()).await;
        assert!(matches!(result, Err(Error::InvalidClassifier(_))));
        assert!(pool.cache().is_empty().await);
    }
}
