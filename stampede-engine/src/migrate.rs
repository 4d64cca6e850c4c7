//! Offload/onload orchestrator.
//!
//! Moves tenants between the serving tier and the offloaded cold-storage
//! tier in bounded batches. After each bulk status update the orchestrator
//! polls the backend until every tenant of the batch reports the target
//! state; a convergence timeout is reported and tolerated, not fatal.

use std::sync::Arc;
use stampede_core::config::MigrationConfig;
use stampede_core::gateway::GatewayError;
use stampede_core::{
    lifecycle, poll_until, retry, ActivityStatus, EngineMetrics, PollError, Result, RetryPolicy,
    TenantName, TenantStore,
};
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Which way tenants are being migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `ACTIVE`/`COLD` tenants move to the `OFFLOADED` tier.
    Offload,
    /// `OFFLOADED` tenants move back to `ACTIVE`.
    Onload,
}

impl Direction {
    /// States a tenant may be in to be selected for this migration.
    #[must_use]
    pub fn source_states(self) -> &'static [ActivityStatus] {
        match self {
            Self::Offload => &[ActivityStatus::Active, ActivityStatus::Cold],
            Self::Onload => &[ActivityStatus::Offloaded],
        }
    }

    /// State the migration drives tenants to.
    #[must_use]
    pub fn target_state(self) -> ActivityStatus {
        match self {
            Self::Offload => ActivityStatus::Offloaded,
            Self::Onload => ActivityStatus::Active,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Offload => "offload",
            Self::Onload => "onload",
        }
    }
}

/// Outcome of a completed migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Tenants moved by this run.
    pub moved: u64,
    /// Batches it took to move them.
    pub batches: u64,
    /// Batches whose convergence poll timed out.
    pub timed_out_batches: u64,
}

/// The tier migration orchestrator.
pub struct TierMigrator {
    store: Arc<dyn TenantStore>,
    metrics: Arc<EngineMetrics>,
    cfg: MigrationConfig,
    direction: Direction,
    retry_policy: RetryPolicy,
}

impl TierMigrator {
    /// Build a migrator driving tenants in the given direction.
    pub fn new(
        store: Arc<dyn TenantStore>,
        metrics: Arc<EngineMetrics>,
        cfg: MigrationConfig,
        direction: Direction,
    ) -> Self {
        Self { store, metrics, cfg, direction, retry_policy: RetryPolicy::default() }
    }

    /// Override the retry policy for the bulk status updates.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Migrate batches until `total_tenants` have been moved or the backend
    /// reports that the whole population is already in the target state.
    pub async fn run(&self) -> Result<MigrationReport> {
        let verb = self.direction.verb();
        let mut report = MigrationReport::default();

        while report.moved < self.cfg.total_tenants {
            let batch = self.next_batch().await;
            if batch.is_empty() {
                warn!(moved = report.moved, "no more tenants available to {verb}, retrying");
                if self.population_converged().await {
                    info!("all tenants are already {}", self.direction.target_state());
                    break;
                }
                sleep(self.cfg.poll_interval).await;
                continue;
            }

            match self.migrate_batch(&batch).await {
                Ok(timed_out) => {
                    report.moved += batch.len() as u64;
                    report.batches += 1;
                    if timed_out {
                        report.timed_out_batches += 1;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to {verb} batch, reselecting");
                }
            }
        }

        self.report_partial_convergence(&report).await;
        Ok(report)
    }

    /// Select up to `tenants_per_cycle` tenants in a source state. Listing
    /// errors yield an empty batch and are retried by the caller.
    async fn next_batch(&self) -> Vec<(TenantName, ActivityStatus)> {
        let tenants = match self.store.get_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                info!(error = %e, "error getting tenants, retrying");
                return Vec::new();
            }
        };
        let mut candidates: Vec<(TenantName, ActivityStatus)> = tenants
            .into_iter()
            .filter(|(_, status)| self.direction.source_states().contains(status))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        candidates.truncate(self.cfg.tenants_per_cycle as usize);
        candidates
    }

    /// Drive one batch to the target state. Returns whether the convergence
    /// poll timed out.
    async fn migrate_batch(&self, batch: &[(TenantName, ActivityStatus)]) -> Result<bool> {
        let target = self.direction.target_state();
        for (_, status) in batch {
            lifecycle::ensure_legal(*status, target)?;
        }

        let started = Instant::now();
        let updates: Vec<(TenantName, ActivityStatus)> =
            batch.iter().map(|(name, _)| (name.clone(), target)).collect();
        info!(count = updates.len(), "{}ing {} tenants", self.direction.verb(), updates.len());
        retry(&self.retry_policy, || self.store.update_tenants(&updates)).await?;

        match self.direction {
            Direction::Offload => self.metrics.tenants_offloaded(updates.len() as u64),
            Direction::Onload => self.metrics.tenants_onloaded(updates.len() as u64),
        }

        let names: Vec<TenantName> = batch.iter().map(|(name, _)| name.clone()).collect();
        let converged = poll_until(self.cfg.poll_interval, self.cfg.poll_timeout, || {
            let names = names.clone();
            async move {
                let statuses = self.store.get_tenants_by_name(&names).await?;
                Ok::<_, GatewayError>(names.iter().all(|name| statuses.get(name) == Some(&target)))
            }
        })
        .await;

        let timed_out = match converged {
            Ok(()) => false,
            Err(PollError::Timeout { waited }) => {
                warn!(?waited, count = names.len(), "batch did not fully converge in time");
                true
            }
        };

        let took = started.elapsed();
        match self.direction {
            Direction::Offload => self.metrics.offload_batch_duration(took),
            Direction::Onload => self.metrics.onload_batch_duration(took),
        }
        Ok(timed_out)
    }

    /// Whether the whole population already reports the target state.
    async fn population_converged(&self) -> bool {
        match self.count_in_target().await {
            Ok(count) => count >= self.cfg.total_tenants,
            Err(e) => {
                info!(error = %e, "error getting tenants, retrying");
                false
            }
        }
    }

    async fn count_in_target(&self) -> std::result::Result<u64, GatewayError> {
        let target = self.direction.target_state();
        let tenants = self.store.get_tenants().await?;
        Ok(tenants.values().filter(|status| **status == target).count() as u64)
    }

    /// Log a final warning when fewer tenants than requested ended up in the
    /// target state.
    async fn report_partial_convergence(&self, report: &MigrationReport) {
        match self.count_in_target().await {
            Ok(count) if count < report.moved => {
                warn!(
                    converged = count,
                    moved = report.moved,
                    "not all tenants have been {}ed",
                    self.direction.verb()
                );
            }
            Ok(count) => {
                info!(converged = count, moved = report.moved, batches = report.batches, "migration finished");
            }
            Err(e) => warn!(error = %e, "could not verify final convergence"),
        }
    }
}
