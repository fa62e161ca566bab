//! Core types and shared functionality for the DBaaS client.
//!
//! This crate provides:
//! - Classifiers, their canonical form and validation
//! - Single-flight result cache keyed by classifier
//! - Data model and retry policies for the agent API
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;

pub use cache::{CacheKey, Discriminator, SingleflightCache};
pub use classifier::Classifier;
pub use config::{AppConfig, ConfigError, RetryConfig};
pub use error::{BoxError, Error, ProviderError};
pub use model::{BaseDbParams, ConnectionProperties, LogicalDb};
pub use retry::RetryPolicy;
