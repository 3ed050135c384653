//! # Site Contract wasmCloud Provider Binary
//!
//! Entry point for the Site Contract capability provider.
//! Uses wasmCloud provider runtime for lifecycle management.

use anyhow::{Context, Result};
use tracing::info;
use wasmcloud_provider_sdk::{load_host_data, run_provider};

use site_contract_provider::SiteContractProvider;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("site_contract_provider=info".parse()?),
        )
        .init();

    info!("Starting Site Contract Provider for wasmCloud");

    let host_data = load_host_data().context("Failed to load wasmCloud host data")?;

    info!("Provider ID: {}", host_data.provider_key);
    info!("Config entries: {}", host_data.config.len());

    let provider = SiteContractProvider::from_host_data(host_data.clone())
        .await
        .context("Failed to create Site Contract provider")?;

    info!("Provider ready - consuming contract queue");
    let handler = run_provider(provider, "site-contract-provider")
        .await
        .context("Provider runtime error")?;
    handler.await;

    info!("Site Contract Provider shutdown complete");
    Ok(())
}
