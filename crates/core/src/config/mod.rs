//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DBAAS_*)
//! 2. TOML config file (if DBAAS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::retry::RetryPolicy;

mod validation;

pub use validation::ConfigError;

/// Default DBaaS agent address inside the cluster.
pub const DEFAULT_AGENT_URL: &str = "http://dbaas-agent:8080";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DBAAS_*, nested keys separated by `__`)
/// 2. TOML config file (if DBAAS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the DBaaS agent.
    ///
    /// Set via DBAAS_AGENT_URL environment variable.
    #[serde(default = "default_agent_url")]
    pub agent_url: String,

    /// Namespace the calling microservice runs in.
    ///
    /// Set via DBAAS_NAMESPACE environment variable.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Name of the calling microservice, used for base classifiers.
    ///
    /// Set via DBAAS_MICROSERVICE_NAME environment variable.
    #[serde(default)]
    pub microservice_name: Option<String>,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via DBAAS_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via DBAAS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Static bearer token, used when no other token source is wired in.
    ///
    /// Set via DBAAS_TOKEN environment variable.
    #[serde(default)]
    pub token: Option<String>,

    /// Retry tuning for requests to the agent.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry tuning for requests to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first attempt.
    ///
    /// Set via DBAAS_RETRY__MAX_ATTEMPTS environment variable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    ///
    /// Set via DBAAS_RETRY__DELAY_MS environment variable.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Status codes that stop create-or-get retries immediately.
    #[serde(default = "default_create_non_retryable")]
    pub create_non_retryable: Vec<u16>,

    /// Status codes that stop get-connection retries immediately.
    #[serde(default = "default_connection_non_retryable")]
    pub connection_non_retryable: Vec<u16>,
}

fn default_agent_url() -> String {
    DEFAULT_AGENT_URL.into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("dbaas-client/", env!("CARGO_PKG_VERSION")).into()
}

fn default_max_attempts() -> u32 {
    12
}

fn default_delay_ms() -> u64 {
    5_000
}

fn default_create_non_retryable() -> Vec<u16> {
    RetryPolicy::create_db().codes().collect()
}

fn default_connection_non_retryable() -> Vec<u16> {
    RetryPolicy::get_connection().codes().collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            create_non_retryable: default_create_non_retryable(),
            connection_non_retryable: default_connection_non_retryable(),
        }
    }
}

impl RetryConfig {
    /// Delay as Duration for use with tokio.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Policy applied to create-or-get requests.
    pub fn create_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.create_non_retryable.iter().copied())
    }

    /// Policy applied to get-connection requests.
    pub fn connection_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.connection_non_retryable.iter().copied())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_url: default_agent_url(),
            namespace: None,
            microservice_name: None,
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            token: None,
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DBAAS_`
    /// 2. TOML file from `DBAAS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DBAAS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DBAAS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Namespace of the calling microservice.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the namespace is not set.
    pub fn require_namespace(&self) -> Result<&str, ConfigError> {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "namespace".into(),
                hint: "Set DBAAS_NAMESPACE environment variable".into(),
            })
    }

    /// Name of the calling microservice.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the microservice name is not set.
    pub fn require_microservice_name(&self) -> Result<&str, ConfigError> {
        self.microservice_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "microservice_name".into(),
                hint: "Set DBAAS_MICROSERVICE_NAME environment variable".into(),
            })
    }

    /// Service-scoped classifier for the configured microservice.
    pub fn service_classifier(&self) -> Result<Classifier, ConfigError> {
        Ok(Classifier::service(self.require_microservice_name()?, self.require_namespace()?))
    }

    /// Tenant-scoped classifier for the configured microservice.
    ///
    /// # Errors
    ///
    /// Fails when identity is not configured or the tenant id is absent.
    pub fn tenant_classifier(&self, tenant_id: &str) -> Result<Classifier, crate::Error> {
        Classifier::tenant(self.require_microservice_name()?, self.require_namespace()?, tenant_id)
    }
}
