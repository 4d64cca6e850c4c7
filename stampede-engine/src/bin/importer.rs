//! Continuous tenant/object import process.

use anyhow::Result;
use stampede_core::config::{GatewayConfig, ImporterConfig, TelemetryConfig};
use stampede_core::gateway::HttpGateway;
use stampede_core::telemetry::serve_metrics;
use stampede_core::{EngineMetrics, TenantStore};
use stampede_engine::{init_tracing, BatchImporter};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let telemetry_cfg = TelemetryConfig::from_env()?;
    let importer_cfg = ImporterConfig::from_env()?;

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    let metrics = Arc::new(EngineMetrics::new());
    tokio::spawn(serve_metrics(Arc::clone(&metrics), telemetry_cfg.prometheus_port));

    BatchImporter::new(store, metrics, importer_cfg).run().await?;
    Ok(())
}
