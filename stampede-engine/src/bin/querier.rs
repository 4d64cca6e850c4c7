//! Query traffic process: one bounded campaign of concurrent workers.

use anyhow::Result;
use stampede_core::config::{GatewayConfig, QueryConfig, TelemetryConfig};
use stampede_core::gateway::HttpGateway;
use stampede_core::telemetry::serve_metrics;
use stampede_core::{EngineMetrics, TenantStore};
use stampede_engine::{init_tracing, QueryLoadGenerator};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let telemetry_cfg = TelemetryConfig::from_env()?;
    let query_cfg = QueryConfig::from_env()?;

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    let metrics = Arc::new(EngineMetrics::new());
    tokio::spawn(serve_metrics(Arc::clone(&metrics), telemetry_cfg.prometheus_port));

    let report = QueryLoadGenerator::new(store, metrics, query_cfg).run().await?;
    info!(
        issued = report.issued,
        successes = report.successes,
        failures = report.failures,
        "query campaign finished"
    );

    // Stick around so the final gauge and counter values get scraped.
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(())
}
