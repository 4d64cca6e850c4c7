//! Onload process: brings offloaded tenants back into the serving tier.

use anyhow::Result;
use stampede_core::config::{GatewayConfig, MigrationConfig, TelemetryConfig};
use stampede_core::gateway::HttpGateway;
use stampede_core::telemetry::serve_metrics;
use stampede_core::{EngineMetrics, TenantStore};
use stampede_engine::{init_tracing, Direction, TierMigrator};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let telemetry_cfg = TelemetryConfig::from_env()?;
    let migration_cfg = MigrationConfig::from_env()?;

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    let metrics = Arc::new(EngineMetrics::new());
    tokio::spawn(serve_metrics(Arc::clone(&metrics), telemetry_cfg.prometheus_port));

    let report = TierMigrator::new(store, metrics, migration_cfg, Direction::Onload).run().await?;
    info!(moved = report.moved, batches = report.batches, "onloader finished");
    Ok(())
}
