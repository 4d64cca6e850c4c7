//! TTL expiry scanner process. Run exactly one per deployment.

use anyhow::Result;
use stampede_core::config::{GatewayConfig, ScannerConfig};
use stampede_core::gateway::HttpGateway;
use stampede_core::TenantStore;
use stampede_engine::{init_tracing, ExpiryScanner};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let scanner_cfg = ScannerConfig::from_env()?;

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    ExpiryScanner::new(store, scanner_cfg).run().await?;
    Ok(())
}
