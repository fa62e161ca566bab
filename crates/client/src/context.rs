//! Per-call request context.
//!
//! Carries the headers propagated to the agent on every outbound request and
//! an optional cancellation token that bounds token acquisition, sends and
//! the waits between retries.

use std::future::Future;
use std::time::Duration;

use dbaas_core::Error;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

/// Caller-supplied context for one pool or client operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: Vec<(String, String)>,
    cancel: Option<CancellationToken>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagate `name: value` on every request made for this context.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Bind the context to a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Propagated headers as a reqwest header map.
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` if a header name or value is not valid HTTP.
    pub(crate) fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Request(format!("error during context serializing: {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Request(format!("error during context serializing: {}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Run `fut` unless the context is cancelled first.
    pub(crate) async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                out = fut => Ok(out),
            },
            None => Ok(fut.await),
        }
    }

    /// Wait for `delay`, returning early with `Error::Cancelled` on cancellation.
    pub(crate) async fn sleep(&self, delay: Duration) -> Result<(), Error> {
        self.guard(tokio::time::sleep(delay)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map() {
        let ctx = RequestContext::new().with_header("X-Tenant-Id", "tenant-id-123").with_header("x-request-id", "abc");
        let map = ctx.header_map().unwrap();
        assert_eq!(map.get("x-tenant-id").unwrap(), "tenant-id-123");
        assert_eq!(map.get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn test_invalid_header_name() {
        let ctx = RequestContext::new().with_header("bad header", "value");
        assert!(matches!(ctx.header_map(), Err(Error::Request(_))));
    }

    #[tokio::test]
    async fn test_guard_without_token() {
        let ctx = RequestContext::new();
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.guard(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_sleep_cancelled() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(token.clone());
        token.cancel();

        assert!(ctx.is_cancelled());
        let started = std::time::Instant::now();
        let result = ctx.sleep(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
