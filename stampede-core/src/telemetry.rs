//! Prometheus metric set and HTTP exporter.
//!
//! One [`EngineMetrics`] instance is created per process and shared by every
//! driver. The metric names form the engine's observable contract; dashboards
//! and the load-test analysis tooling key off them.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// All counters, gauges and histograms the engine emits.
pub struct EngineMetrics {
    registry: Registry,

    tenants_added: IntCounter,
    tenants_added_implicitly: IntCounter,
    objects_added: IntCounter,
    tenants_offloaded: IntCounter,
    tenants_onloaded: IntCounter,
    query_result: IntCounterVec,

    querying_tenants: IntGauge,
    querying_users: IntGauge,

    tenant_batch_seconds: Histogram,
    objects_batch_seconds: Histogram,
    tenant_offloaded_seconds: Histogram,
    tenant_onloaded_seconds: Histogram,
    vector_query_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help)).unwrap();
    registry.register(Box::new(counter.clone())).unwrap();
    counter
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::with_opts(Opts::new(name, help)).unwrap();
    registry.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn histogram(registry: &Registry, name: &str, help: &str) -> Histogram {
    let histogram = Histogram::with_opts(HistogramOpts::new(name, help)).unwrap();
    registry.register(Box::new(histogram.clone())).unwrap();
    histogram
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create and register the full metric set on a fresh registry.
    ///
    /// Registration failures are programmer errors (duplicate names) and
    /// panic at startup.
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let query_result = IntCounterVec::new(
            Opts::new("query_result_total", "Outcome of each vector query"),
            &["result"],
        )
        .unwrap();
        registry.register(Box::new(query_result.clone())).unwrap();

        Self {
            tenants_added: counter(&registry, "tenants_added_total", "Tenants created by the importer"),
            tenants_added_implicitly: counter(
                &registry,
                "tenants_added_implicitly_total",
                "Tenants assumed to exist, creation skipped",
            ),
            objects_added: counter(&registry, "objects_added_total", "Objects written across all tenants"),
            tenants_offloaded: counter(&registry, "tenants_offloaded_total", "Tenants moved to the offloaded tier"),
            tenants_onloaded: counter(&registry, "tenants_onloaded_total", "Tenants moved back to the active tier"),
            query_result,
            querying_tenants: gauge(
                &registry,
                "querying_tenants_total",
                "Tenants that currently have users querying them",
            ),
            querying_users: gauge(
                &registry,
                "querying_users_total",
                "Users across tenants currently sending queries",
            ),
            tenant_batch_seconds: histogram(
                &registry,
                "tenant_batch_seconds",
                "Duration of one tenant-creation batch",
            ),
            objects_batch_seconds: histogram(
                &registry,
                "objects_batch_seconds",
                "Duration of one object-import batch",
            ),
            tenant_offloaded_seconds: histogram(
                &registry,
                "tenant_offloaded_seconds",
                "Duration to offload one batch of tenants",
            ),
            tenant_onloaded_seconds: histogram(
                &registry,
                "tenant_onloaded_seconds",
                "Duration to onload one batch of tenants",
            ),
            vector_query_seconds: histogram(
                &registry,
                "vector_query_seconds",
                "Duration of a single vector query",
            ),
            registry,
        }
    }

    /// Record tenants created by the importer.
    pub fn tenants_added(&self, count: u64) {
        self.tenants_added.inc_by(count);
    }

    /// Record tenants whose creation was implicitly skipped.
    pub fn tenants_added_implicitly(&self, count: u64) {
        self.tenants_added_implicitly.inc_by(count);
    }

    /// Record objects written.
    pub fn objects_added(&self, count: u64) {
        self.objects_added.inc_by(count);
    }

    /// Record tenants offloaded.
    pub fn tenants_offloaded(&self, count: u64) {
        self.tenants_offloaded.inc_by(count);
    }

    /// Record tenants onloaded.
    pub fn tenants_onloaded(&self, count: u64) {
        self.tenants_onloaded.inc_by(count);
    }

    /// Record the outcome of one query.
    pub fn query_result(&self, success: bool) {
        let label = if success { "success" } else { "failure" };
        self.query_result.with_label_values(&[label]).inc();
    }

    /// Adjust the number of tenants currently being queried.
    pub fn querying_tenants_add(&self, count: i64) {
        self.querying_tenants.add(count);
    }

    /// Adjust the number of active query workers.
    pub fn querying_users_add(&self, count: i64) {
        self.querying_users.add(count);
    }

    /// Observe one tenant-creation batch duration.
    pub fn tenant_batch_duration(&self, took: Duration) {
        self.tenant_batch_seconds.observe(took.as_secs_f64());
    }

    /// Observe one object-import batch duration.
    pub fn objects_batch_duration(&self, took: Duration) {
        self.objects_batch_seconds.observe(took.as_secs_f64());
    }

    /// Observe one offload batch duration.
    pub fn offload_batch_duration(&self, took: Duration) {
        self.tenant_offloaded_seconds.observe(took.as_secs_f64());
    }

    /// Observe one onload batch duration.
    pub fn onload_batch_duration(&self, took: Duration) {
        self.tenant_onloaded_seconds.observe(took.as_secs_f64());
    }

    /// Observe one query duration. Recorded for successes and failures alike.
    pub fn query_duration(&self, took: Duration) {
        self.vector_query_seconds.observe(took.as_secs_f64());
    }

    /// Render the registry in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather()).unwrap_or_else(|e| {
            warn!("failed to encode metrics: {e}");
            String::new()
        })
    }
}

async fn metrics_handler(State(metrics): State<Arc<EngineMetrics>>) -> String {
    metrics.render()
}

/// Serve `/metrics` on the given port until the process exits.
pub async fn serve_metrics(metrics: Arc<EngineMetrics>, port: u16) -> std::io::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(metrics);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving Prometheus metrics");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_all_contract_metric_names() {
        let metrics = EngineMetrics::new();
        metrics.tenants_added(3);
        metrics.tenants_added_implicitly(1);
        metrics.objects_added(100);
        metrics.tenants_offloaded(5);
        metrics.tenants_onloaded(5);
        metrics.query_result(true);
        metrics.query_result(false);
        metrics.querying_tenants_add(2);
        metrics.querying_users_add(6);
        metrics.tenant_batch_duration(Duration::from_millis(120));
        metrics.objects_batch_duration(Duration::from_millis(340));
        metrics.offload_batch_duration(Duration::from_secs(2));
        metrics.onload_batch_duration(Duration::from_secs(2));
        metrics.query_duration(Duration::from_millis(15));

        let rendered = metrics.render();
        for name in [
            "tenants_added_total",
            "tenants_added_implicitly_total",
            "objects_added_total",
            "tenants_offloaded_total",
            "tenants_onloaded_total",
            "query_result_total",
            "querying_tenants_total",
            "querying_users_total",
            "tenant_batch_seconds",
            "objects_batch_seconds",
            "tenant_offloaded_seconds",
            "tenant_onloaded_seconds",
            "vector_query_seconds",
        ] {
            assert!(rendered.contains(name), "missing metric {name} in exposition");
        }
    }

    #[test]
    fn query_result_counts_by_label() {
        let metrics = EngineMetrics::new();
        metrics.query_result(true);
        metrics.query_result(true);
        metrics.query_result(false);
        let rendered = metrics.render();
        assert!(rendered.contains("query_result_total{result=\"success\"} 2"));
        assert!(rendered.contains("query_result_total{result=\"failure\"} 1"));
    }
}
