//! Bearer token sources for agent requests.

use async_trait::async_trait;
use dbaas_core::BoxError;

use crate::context::RequestContext;

/// Source of the bearer token attached to agent requests.
///
/// An empty token means "send no Authorization header".
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, ctx: &RequestContext) -> Result<String, BoxError>;
}

/// Fixed token, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _ctx: &RequestContext) -> Result<String, BoxError> {
        Ok(self.token.clone())
    }
}

/// No authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenProvider;

#[async_trait]
impl TokenProvider for NoTokenProvider {
    async fn get_token(&self, _ctx: &RequestContext) -> Result<String, BoxError> {
        Ok(String::new())
    }
}
