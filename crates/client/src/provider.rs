//! Alternate logical database sources consulted before the agent.
//!
//! Providers are tried in configured order. The first one that answers wins
//! and the network is skipped; a provider error aborts the whole operation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dbaas_core::{BaseDbParams, Classifier, ConnectionProperties, Error, LogicalDb, ProviderError};

/// A source of logical databases other than the agent (static config, a
/// coordination service, ...).
#[async_trait]
pub trait LogicalDbProvider: Send + Sync {
    /// `Ok(None)` passes the request on to the next provider.
    async fn get_or_create_db(
        &self, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Option<LogicalDb>, ProviderError>;

    /// `Ok(None)` or an empty map passes the request on to the next provider.
    async fn get_connection(
        &self, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Option<ConnectionProperties>, ProviderError>;
}

/// Ordered list of providers.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn LogicalDbProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider; it is consulted after the ones already present.
    pub fn with_provider(mut self, provider: impl LogicalDbProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn push(&mut self, provider: Arc<dyn LogicalDbProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn get_or_create_db(
        &self, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Option<LogicalDb>, Error> {
        for (index, provider) in self.providers.iter().enumerate() {
            match provider.get_or_create_db(db_type, classifier, params).await {
                Ok(Some(db)) => {
                    tracing::debug!(db_type, provider = index, "using logical db provider for database");
                    return Ok(Some(db));
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::error!(db_type, provider = index, error = %err, "error during logical db providing");
                    return Err(Error::Provider(err));
                }
            }
        }
        Ok(None)
    }

    pub async fn get_connection(
        &self, db_type: &str, classifier: &Classifier, params: &BaseDbParams,
    ) -> Result<Option<ConnectionProperties>, Error> {
        for (index, provider) in self.providers.iter().enumerate() {
            match provider.get_connection(db_type, classifier, params).await {
                Ok(Some(connection)) if !connection.is_empty() => {
                    tracing::debug!(db_type, provider = index, "using logical db provider for connection");
                    return Ok(Some(connection));
                }
                Ok(_) => continue,
                Err(err) => {
                    tracing::error!(db_type, provider = index, error = %err, "error during logical db providing");
                    return Err(Error::Provider(err));
                }
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderChain").field("providers", &self.providers.len()).finish()
    }
}
