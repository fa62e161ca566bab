//! Retrying transport shared by the agent operations.
//!
//! One state machine drives both create-or-get and get-connection; only the
//! set of statuses that interrupt the loop differs between them.

use std::time::Duration;

use bytes::Bytes;
use dbaas_core::{Error, RetryPolicy};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use url::Url;

use super::{AgentClient, endpoints};
use crate::context::RequestContext;

impl AgentClient {
    /// Send `body` to `url`, retrying per configuration until the agent
    /// answers 200 or 201.
    ///
    /// Attempts run for `0..=max_attempts`. A transport failure waits and
    /// retries until the final attempt. A status from `policy` interrupts the
    /// loop at once; 202 and other statuses >= 300 wait and retry; remaining
    /// 2xx statuses retry without waiting. Nothing waits after the final
    /// attempt. When the loop ends without success the api-version endpoint
    /// is probed to tell an unavailable agent apart from a refusal.
    ///
    /// # Errors
    ///
    /// - `Error::Token` when the bearer token cannot be acquired
    /// - `Error::ConnectFailed` when the final attempt fails in transport
    /// - `Error::StopRetrying` when `policy` interrupted the loop
    /// - `Error::ExhaustedRetries` when every attempt was used up
    /// - `Error::ApiUnavailable` when the probe fails after either of the above
    /// - `Error::Cancelled` when the context is cancelled
    pub(crate) async fn send_with_retry(
        &self, ctx: &RequestContext, method: Method, url: Url, body: Bytes, policy: &RetryPolicy,
    ) -> Result<Bytes, Error> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let token = self.acquire_token(ctx).await?;
        let headers = ctx.header_map()?;
        let max_attempts = self.config.max_attempts;
        let delay = self.config.delay;

        let mut last_status = None;
        let mut last_body = Bytes::new();
        let mut interrupted = false;

        for attempt in 0..=max_attempts {
            let is_last = attempt == max_attempts;

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(CONTENT_TYPE, "application/json")
                .headers(headers.clone())
                .body(body.clone());
            if !token.is_empty() {
                request = request.bearer_auth(&token);
            }

            tracing::debug!(%method, %url, attempt, max_attempts, "sending request to dbaas");
            let response = match ctx.guard(request.send()).await? {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(%url, attempt, max_attempts, error = %err, "error during sending request to dbaas");
                    if is_last {
                        return Err(connect_failure(last_status, max_attempts, delay, &err));
                    }
                    ctx.sleep(delay).await?;
                    continue;
                }
            };

            let status = response.status();
            let code = status.as_u16();
            let success = status == StatusCode::OK || status == StatusCode::CREATED;
            last_status = Some(code);
            last_body = match ctx.guard(response.bytes()).await? {
                Ok(bytes) => bytes,
                Err(err) if success => {
                    return Err(Error::Request(format!("error occurred during response body reading: {}", err)));
                }
                Err(err) => {
                    tracing::warn!(status = code, error = %err, "failed to read dbaas response body");
                    Bytes::new()
                }
            };

            if success {
                tracing::debug!(status = code, "got response from dbaas");
                return Ok(last_body);
            }

            if policy.is_non_retryable(code) {
                tracing::error!(%method, %url, status = code, "request to dbaas failed with non-retryable status");
                interrupted = true;
            } else if status == StatusCode::ACCEPTED {
                tracing::info!(%method, %url, attempt, max_attempts, "database is not created yet, retrying");
                if !is_last {
                    ctx.sleep(delay).await?;
                }
            } else if code >= 300 {
                tracing::warn!(%url, status = code, attempt, max_attempts, "request to dbaas failed, retrying");
                if !is_last {
                    ctx.sleep(delay).await?;
                }
            }

            if interrupted || is_last {
                break;
            }
        }

        let status = last_status.unwrap_or_default();
        self.check_api_version(ctx, status).await?;

        let body = String::from_utf8_lossy(&last_body).into_owned();
        if interrupted {
            Err(Error::StopRetrying { status, body })
        } else {
            Err(Error::ExhaustedRetries { status, body })
        }
    }

    async fn acquire_token(&self, ctx: &RequestContext) -> Result<String, Error> {
        match ctx.guard(self.tokens.get_token(ctx)).await? {
            Ok(token) => Ok(token),
            Err(err) => {
                tracing::error!(error = %err, "some problems during getting m2m token");
                Err(Error::Token(err.to_string()))
            }
        }
    }

    /// Probe `GET /api-version`; anything but 200 means the agent is unusable.
    ///
    /// `status` is the last status seen by the failed call and is carried into
    /// the error.
    async fn check_api_version(&self, ctx: &RequestContext, status: u16) -> Result<(), Error> {
        let url = endpoints::api_version(&self.base)?;
        tracing::debug!(%url, "probing dbaas api version");

        let unavailable = |reason: String| {
            tracing::error!(
                status,
                reason = %reason,
                "API v3 dbaas-aggregator is not available; dbaas version 3.18.0 or later is required"
            );
            Err(Error::ApiUnavailable { status, reason })
        };

        match ctx.guard(self.http.get(url).send()).await? {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::debug!("dbaas v3 is available");
                Ok(())
            }
            Ok(response) => unavailable(format!("api-version answered {}", response.status().as_u16())),
            Err(err) => unavailable(err.to_string()),
        }
    }
}

fn connect_failure(last_status: Option<u16>, max_attempts: u32, delay: Duration, err: &reqwest::Error) -> Error {
    let message = if last_status == Some(StatusCode::ACCEPTED.as_u16()) {
        let waited = u128::from(max_attempts) * delay.as_millis() / 1000;
        format!("database was not created during a timeout of {} seconds", waited)
    } else {
        "failed to connect to dbaas".to_string()
    };
    Error::ConnectFailed { message, reason: format!("dbaas error: {}", err) }
}
