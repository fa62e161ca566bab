//! Unified error types for the DBaaS client.
//!
//! Every terminal failure carries a stable prefix so callers (and logs) can
//! tell the kinds apart without matching on the message text.

use crate::config::ConfigError;

/// Boxed error returned by pluggable capabilities (providers, token sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error reported by a logical database provider.
pub type ProviderError = BoxError;

/// Unified error type for classifier handling, the cache and the agent client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local classifier validation failed; nothing was sent over the wire.
    #[error("CLASSIFIER_INVALID: {0}")]
    InvalidClassifier(String),

    /// A logical database provider failed; the network is not consulted.
    #[error("PROVIDER_ERROR: {0}")]
    Provider(ProviderError),

    /// The bearer token could not be acquired.
    #[error("TOKEN_ERROR: some problems during getting m2m token: {0}")]
    Token(String),

    /// Transport-level failure on the final attempt.
    #[error("CONNECT_FAILED: {message} ({reason})")]
    ConnectFailed { message: String, reason: String },

    /// The agent answered with a status the retry policy marks as non-retryable.
    #[error("STOP_RETRYING: incorrect response from dbaas, stop retrying (response code {status}): {body}")]
    StopRetrying { status: u16, body: String },

    /// The attempt budget was consumed without a successful answer.
    #[error("RETRIES_EXHAUSTED: failed to get response from dbaas (response code {status}): {body}")]
    ExhaustedRetries { status: u16, body: String },

    /// The api-version probe failed after the request itself failed.
    #[error("API_UNAVAILABLE: API v3 dbaas-aggregator is not available (response code {status}): {reason}")]
    ApiUnavailable { status: u16, reason: String },

    /// The caller cancelled the request.
    #[error("CANCELLED: request was cancelled")]
    Cancelled,

    /// Request body could not be serialized.
    #[error("ENCODE_FAILED: {0}")]
    Encode(String),

    /// Response body could not be parsed.
    #[error("DECODE_FAILED: {0}")]
    Decode(String),

    /// Request could not be built or the response could not be read.
    #[error("REQUEST_FAILED: {0}")]
    Request(String),

    /// Invalid or missing configuration.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// HTTP status code associated with the failure, if the agent answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::StopRetrying { status, .. }
            | Error::ExhaustedRetries { status, .. }
            | Error::ApiUnavailable { status, .. } => Some(*status),
            _ => None,
        }
    }
}
