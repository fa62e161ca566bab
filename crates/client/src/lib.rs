//! Client code for the DBaaS agent.
//!
//! This crate provides the retrying agent client, the logical database
//! provider chain and the caching pool shared by services and the CLI.

pub mod agent;
pub mod context;
pub mod pool;
pub mod provider;
pub mod token;

pub use agent::{AgentClient, AgentConfig, DbaasClient};
pub use context::RequestContext;
pub use pool::DbaasPool;
pub use provider::{LogicalDbProvider, ProviderChain};
pub use token::{NoTokenProvider, StaticTokenProvider, TokenProvider};
