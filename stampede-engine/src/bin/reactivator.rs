//! Reactivation sampler process: periodically re-enables frozen tenants.

use anyhow::Result;
use stampede_core::config::{GatewayConfig, SamplerConfig};
use stampede_core::gateway::HttpGateway;
use stampede_core::TenantStore;
use stampede_engine::{init_tracing, ReactivationSampler};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let sampler_cfg = SamplerConfig::from_env()?;

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    ReactivationSampler::new(store, sampler_cfg).run().await?;
    Ok(())
}
