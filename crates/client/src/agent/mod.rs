//! DBaaS agent client.
//!
//! Resolves logical databases through the provider chain first and falls back
//! to the agent's v3 API, retrying while the database is being provisioned.
//!
//! ### Endpoints
//!
//! - **Create or get**: `PUT {agent}/api/v3/dbaas/{namespace}/databases`
//! - **Get connection**: `POST {agent}/api/v3/dbaas/{namespace}/databases/get-by-classifier/{type}`
//! - **Availability probe**: `GET {agent}/api-version`
//!
//! Every request carries `Content-Type: application/json`, the bearer token
//! (when one is issued) and the headers propagated by the request context.

pub mod endpoints;
pub mod request;
pub mod response;
mod retry;

pub use request::{ConnectionRequest, CreateDbRequest};
pub use response::ConnectionResponse;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbaas_core::classifier;
use dbaas_core::{AppConfig, BaseDbParams, Classifier, ConfigError, ConnectionProperties, Error, LogicalDb, RetryPolicy};
use reqwest::Method;
use url::Url;

use crate::context::RequestContext;
use crate::provider::ProviderChain;
use crate::token::TokenProvider;

/// Agent client configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the agent (default: http://dbaas-agent:8080).
    pub agent_url: String,
    /// Namespace of the calling microservice; used in URLs and enrichment.
    pub namespace: String,
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Retries after the first attempt (default: 12).
    pub max_attempts: u32,
    /// Wait between attempts (default: 5s).
    pub delay: Duration,
    /// Statuses that stop create-or-get retries (default: 401, 403).
    pub create_policy: RetryPolicy,
    /// Statuses that stop get-connection retries (default: 400..=404).
    pub connection_policy: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            agent_url: app.agent_url,
            namespace: String::new(),
            timeout: Duration::from_millis(app.timeout_ms),
            user_agent: app.user_agent,
            max_attempts: app.retry.max_attempts,
            delay: app.retry.delay(),
            create_policy: app.retry.create_policy(),
            connection_policy: app.retry.connection_policy(),
        }
    }
}

impl AgentConfig {
    /// Derive the client configuration from loaded application config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the namespace is not configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            agent_url: config.agent_url.clone(),
            namespace: config.require_namespace()?.to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            max_attempts: config.retry.max_attempts,
            delay: config.retry.delay(),
            create_policy: config.retry.create_policy(),
            connection_policy: config.retry.connection_policy(),
        })
    }
}

/// Operations the pool needs from a client.
#[async_trait]
pub trait DbaasClient: Send + Sync {
    /// Find or provision the logical database identified by `classifier`.
    async fn get_or_create_db(
        &self, ctx: &RequestContext, db_type: &str, classifier: Classifier, params: &BaseDbParams,
    ) -> Result<LogicalDb, Error>;

    /// Fetch connection properties of an existing logical database.
    async fn get_connection(
        &self, ctx: &RequestContext, db_type: &str, classifier: Classifier, params: &BaseDbParams,
    ) -> Result<ConnectionProperties, Error>;
}

/// Client of the DBaaS agent.
#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base: Url,
    config: AgentConfig,
    providers: ProviderChain,
    tokens: Arc<dyn TokenProvider>,
}

impl AgentClient {
    /// Create a new client with the given configuration and token source.
    pub fn new(config: AgentConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, Error> {
        if config.namespace.is_empty() {
            return Err(ConfigError::Missing {
                field: "namespace".into(),
                hint: "Set DBAAS_NAMESPACE environment variable".into(),
            }
            .into());
        }

        let base = Url::parse(&config.agent_url)
            .map_err(|e| ConfigError::Invalid { field: "agent_url".into(), reason: e.to_string() })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Request(format!("failed to build http client: {}", e)))?;

        Ok(Self { http, base, config, providers: ProviderChain::default(), tokens })
    }

    /// Create a client from loaded application config.
    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, Error> {
        Self::new(AgentConfig::from_app_config(config)?, tokens)
    }

    /// Consult `providers` before the agent.
    pub fn with_providers(mut self, providers: ProviderChain) -> Self {
        self.providers = providers;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }
}

#[async_trait]
impl DbaasClient for AgentClient {
    #[tracing::instrument(skip_all, fields(db_type = %db_type))]
    async fn get_or_create_db(
        &self, ctx: &RequestContext, db_type: &str, classifier: Classifier, params: &BaseDbParams,
    ) -> Result<LogicalDb, Error> {
        let classifier = classifier::enrich(classifier, &self.config.namespace);
        classifier::validate(&classifier)?;

        if let Some(db) = self.providers.get_or_create_db(db_type, &classifier, params).await? {
            return Ok(db);
        }

        let url = endpoints::get_or_create_database(&self.base, &self.config.namespace)?;
        let body = serde_json::to_vec(&CreateDbRequest { params, classifier: &classifier, db_type })
            .map_err(|e| Error::Encode(format!("got error during marshaling create request: {}", e)))?;

        tracing::info!(classifier = %classifier.to_canonical_string(), "requesting database from dbaas");
        let contents = self.send_with_retry(ctx, Method::PUT, url, body.into(), &self.config.create_policy).await?;

        let db = response::parse_logical_db(&contents)?;
        tracing::info!(
            url = db.url().unwrap_or_default(),
            classifier = %db.classifier.to_canonical_string(),
            "database was successfully got or created"
        );
        Ok(db)
    }

    #[tracing::instrument(skip_all, fields(db_type = %db_type))]
    async fn get_connection(
        &self, ctx: &RequestContext, db_type: &str, classifier: Classifier, params: &BaseDbParams,
    ) -> Result<ConnectionProperties, Error> {
        let classifier = classifier::enrich(classifier, &self.config.namespace);

        if let Some(connection) = self.providers.get_connection(db_type, &classifier, params).await? {
            return Ok(connection);
        }

        let url = endpoints::get_by_classifier(&self.base, &self.config.namespace, db_type)?;
        let body = serde_json::to_vec(&ConnectionRequest::new(&classifier, params))
            .map_err(|e| Error::Encode(format!("got error during marshaling connection request: {}", e)))?;

        let contents = self.send_with_retry(ctx, Method::POST, url, body.into(), &self.config.connection_policy).await?;

        let response = ConnectionResponse::parse(&contents)?;
        tracing::debug!(
            classifier = %response.classifier.as_ref().map(Classifier::to_canonical_string).unwrap_or_default(),
            "returning connection to database"
        );
        Ok(response.into_properties())
    }
}

impl fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClient")
            .field("base", &self.base.as_str())
            .field("config", &self.config)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
