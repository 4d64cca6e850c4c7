//! Batch import engine.
//!
//! Populates a contiguous range of tenant indices with deterministic,
//! idempotent data. The importer walks a sliding window of
//! `tenants_per_cycle` tenants; in continuous mode the window wraps back to
//! the configured minimum once the maximum is exceeded, in bounded mode the
//! loop ends when the total-tenant target is reached.
//!
//! Object identifiers are derived from the object's index within its tenant,
//! so re-importing a window converges to the same logical objects no matter
//! how often a batch is retried.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use stampede_core::config::{ImportMode, ImporterConfig};
use stampede_core::{
    retry, ActivityStatus, DataObject, EngineMetrics, Result, RetryPolicy, TenantName, TenantStore,
    TtlRecord,
};
use tokio::time::Instant;
use tracing::{error, info};

/// Fixed batch size for TTL ledger writes.
const TTL_BATCH_SIZE: usize = 1000;

/// Outcome of one import cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Tenants created through the backend.
    pub tenants_created: u64,
    /// Tenants assumed to already exist (creation skipped).
    pub tenants_implicit: u64,
    /// Objects accepted by the backend.
    pub objects_written: u64,
    /// Objects rejected within otherwise successful batches.
    pub object_failures: u64,
}

/// The batch import engine.
pub struct BatchImporter {
    store: Arc<dyn TenantStore>,
    metrics: Arc<EngineMetrics>,
    cfg: ImporterConfig,
    retry_policy: RetryPolicy,
}

impl BatchImporter {
    /// Build an importer over the given store.
    pub fn new(store: Arc<dyn TenantStore>, metrics: Arc<EngineMetrics>, cfg: ImporterConfig) -> Self {
        Self { store, metrics, cfg, retry_policy: RetryPolicy::default() }
    }

    /// Override the retry policy for cluster-mutating calls.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Run the import loop.
    ///
    /// In continuous mode this never returns; in bounded mode it returns once
    /// the total-tenant target has been reached. A failed cycle is logged and
    /// does not stop the loop.
    pub async fn run(&self) -> Result<()> {
        let mut tenants_total: u64 = 0;
        let mut objects_total: u64 = 0;
        match self.cfg.mode {
            ImportMode::Continuous { min_tenant_id, max_tenant_id } => {
                let mut lower = min_tenant_id;
                loop {
                    if lower >= max_tenant_id {
                        // start over
                        lower = min_tenant_id;
                    }
                    let upper = (lower + self.cfg.tenants_per_cycle).min(max_tenant_id);
                    self.run_logged_cycle(lower, upper, &mut tenants_total, &mut objects_total).await;
                    lower += self.cfg.tenants_per_cycle;
                }
            }
            ImportMode::Bounded { total_tenants } => {
                let mut lower = 0;
                while lower < total_tenants {
                    let upper = (lower + self.cfg.tenants_per_cycle).min(total_tenants);
                    self.run_logged_cycle(lower, upper, &mut tenants_total, &mut objects_total).await;
                    lower = upper;
                }
                info!(tenants_total, objects_total, "bounded import finished");
                Ok(())
            }
        }
    }

    async fn run_logged_cycle(
        &self,
        lower: u64,
        upper: u64,
        tenants_total: &mut u64,
        objects_total: &mut u64,
    ) {
        match self.run_cycle(lower, upper).await {
            Ok(report) => {
                *tenants_total += report.tenants_created + report.tenants_implicit;
                *objects_total += report.objects_written;
                info!(
                    tenants_total = *tenants_total,
                    objects_total = *objects_total,
                    "completed batch {}-{}",
                    TenantName::from_index(lower),
                    TenantName::from_index(upper.saturating_sub(1)),
                );
            }
            Err(e) => {
                error!(lower, upper, error = %e, "import cycle failed, continuing with next window");
            }
        }
    }

    /// Import one window of tenant indices `[lower, upper)`.
    pub async fn run_cycle(&self, lower: u64, upper: u64) -> Result<CycleReport> {
        let names: Vec<TenantName> = (lower..upper).map(TenantName::from_index).collect();
        if names.is_empty() {
            return Ok(CycleReport::default());
        }

        let mut report = CycleReport::default();
        let implicit = {
            let mut rng = rand::thread_rng();
            self.cfg.implicit_tenant_ratio > 0.0 && rng.gen::<f64>() < self.cfg.implicit_tenant_ratio
        };

        if implicit {
            report.tenants_implicit = names.len() as u64;
            self.metrics.tenants_added_implicitly(report.tenants_implicit);
        } else {
            let started = Instant::now();
            retry(&self.retry_policy, || self.store.create_tenants(&names)).await?;
            report.tenants_created = names.len() as u64;
            self.metrics.tenants_added(report.tenants_created);
            self.metrics.tenant_batch_duration(started.elapsed());
        }

        self.write_ttl_records(&names).await?;

        let started = Instant::now();
        for name in &names {
            let (written, failed) = self.import_objects(name).await?;
            report.objects_written += written;
            report.object_failures += failed;
        }
        self.metrics.objects_batch_duration(started.elapsed());
        self.metrics.objects_added(report.objects_written);

        if self.cfg.deactivate_tenants && !implicit {
            self.deactivate(&names).await?;
        }

        Ok(report)
    }

    /// Write one TTL record per tenant with `expiration = now + ttl`.
    async fn write_ttl_records(&self, names: &[TenantName]) -> Result<()> {
        let expiration = Utc::now() + chrono::Duration::seconds(self.cfg.ttl.as_secs() as i64);
        let records: Vec<TtlRecord> = names
            .iter()
            .map(|name| TtlRecord { tenant_name: name.clone(), expiration })
            .collect();
        for chunk in records.chunks(TTL_BATCH_SIZE) {
            let failures = self.store.put_ttl_records(chunk).await?;
            for failure in &failures {
                error!(object_id = %failure.object_id, "TTL record rejected: {}", failure.message);
            }
        }
        Ok(())
    }

    /// Write `objects_per_tenant` randomized objects into one tenant.
    ///
    /// Per-object failures are logged and counted, never escalated: a partial
    /// batch failure must not abort the cycle.
    async fn import_objects(&self, tenant: &TenantName) -> Result<(u64, u64)> {
        let objects: Vec<DataObject> = {
            let mut rng = rand::thread_rng();
            (0..self.cfg.objects_per_tenant)
                .map(|i| DataObject::random(i, self.cfg.vector_dimensions, &mut rng))
                .collect()
        };

        let mut written = 0u64;
        let mut failed = 0u64;
        for chunk in objects.chunks(self.cfg.object_batch_size) {
            let failures = self.store.upsert_objects(tenant, chunk).await?;
            failed += failures.len() as u64;
            written += (chunk.len() - failures.len()) as u64;
            for failure in &failures {
                error!(%tenant, object_id = %failure.object_id, "object rejected: {}", failure.message);
            }
        }
        Ok((written, failed))
    }

    /// Flip freshly created tenants straight to `COLD`.
    async fn deactivate(&self, names: &[TenantName]) -> Result<()> {
        stampede_core::lifecycle::ensure_legal(ActivityStatus::Active, ActivityStatus::Cold)?;
        let updates: Vec<(TenantName, ActivityStatus)> =
            names.iter().map(|name| (name.clone(), ActivityStatus::Cold)).collect();
        retry(&self.retry_policy, || self.store.update_tenants(&updates)).await?;
        info!(count = names.len(), "deactivated freshly created tenants");
        Ok(())
    }
}

/// Tight retry policy for tests and local simulation.
#[must_use]
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO..Duration::from_millis(10))
}
