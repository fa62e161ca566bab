//! dbaas command-line entry point.
//!
//! Resolves a logical database through the agent and prints the result as JSON
//! on stdout. Logging goes to stderr so the output stays machine-readable.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dbaas_client::{DbaasPool, NoTokenProvider, ProviderChain, RequestContext, StaticTokenProvider, TokenProvider};
use dbaas_core::{AppConfig, BaseDbParams, Classifier};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Cli, Commands, Target};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    let tokens: Arc<dyn TokenProvider> = match config.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(StaticTokenProvider::new(token)),
        None => Arc::new(NoTokenProvider),
    };
    let pool = DbaasPool::from_config(&config, tokens, ProviderChain::new())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling request");
            on_signal.cancel();
        }
    });
    let ctx = request_context(&cli.headers, cancel)?;

    let output = match cli.command {
        Commands::GetOrCreate { target, name_prefix, physical_database_id } => {
            let classifier = resolve_classifier(&config, &target)?;
            let params = BaseDbParams { name_prefix, physical_database_id, role: target.role, ..Default::default() };
            let db = pool.get_or_create_db(&ctx, &target.db_type, &classifier, &params).await?;
            serde_json::to_value(&*db)?
        }
        Commands::Connection { target } => {
            let classifier = resolve_classifier(&config, &target)?;
            let params = BaseDbParams { role: target.role, ..Default::default() };
            Value::Object(pool.get_connection(&ctx, &target.db_type, &classifier, &params).await?)
        }
    };

    let rendered = if cli.pretty { serde_json::to_string_pretty(&output)? } else { output.to_string() };
    println!("{}", rendered);

    Ok(())
}

/// Classifier from `--classifier`, `--tenant`, or the configured service identity.
fn resolve_classifier(config: &AppConfig, target: &Target) -> Result<Classifier> {
    if let Some(raw) = &target.classifier {
        return serde_json::from_str(raw).context("--classifier must be a JSON object");
    }
    if let Some(tenant_id) = &target.tenant {
        return Ok(config.tenant_classifier(tenant_id)?);
    }
    Ok(config.service_classifier()?)
}

fn request_context(headers: &[String], cancel: CancellationToken) -> Result<RequestContext> {
    let mut ctx = RequestContext::new().with_cancellation(cancel);
    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header must look like NAME:VALUE, got {:?}", header);
        };
        ctx = ctx.with_header(name.trim(), value.trim());
    }
    Ok(ctx)
}
