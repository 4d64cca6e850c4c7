//! Backup/restore driver.
//!
//! Starts a cluster backup (or restore) and polls until the backend reports
//! a final status. Like tier migration, convergence is bounded: a timeout is
//! reported as a warning together with the last observed status, and the
//! caller decides what to do with a job that is still running.

use std::sync::Arc;
use std::time::Duration;
use stampede_core::types::BackupStatus;
use stampede_core::{poll_until, retry, Result, RetryPolicy, TenantStore};
use tracing::{info, warn};

/// The backup/restore driver.
pub struct BackupDriver {
    store: Arc<dyn TenantStore>,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl BackupDriver {
    /// Build a driver with the default 1s/600s convergence bounds.
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self {
            store,
            retry_policy: RetryPolicy::default(),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(600),
        }
    }

    /// Override the convergence polling bounds.
    #[must_use]
    pub fn with_poll(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Override the retry policy for the start calls.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Start a backup and wait for it to finish. Returns the last observed
    /// status; `STARTED` means the convergence poll timed out.
    pub async fn run_backup(&self, id: &str) -> Result<BackupStatus> {
        retry(&self.retry_policy, || self.store.create_backup(id)).await?;
        info!(id, "backup started");
        let converged = poll_until(self.poll_interval, self.poll_timeout, || async {
            let status = self.store.backup_status(id).await?;
            Ok::<_, stampede_core::GatewayError>(status != BackupStatus::Started)
        })
        .await;

        let status = self.store.backup_status(id).await?;
        match converged {
            Ok(()) => info!(id, ?status, "backup finished"),
            Err(e) => warn!(id, ?status, error = %e, "backup did not finish in time"),
        }
        Ok(status)
    }

    /// Start restoring a backup and wait for it to finish. Mirrors
    /// [`Self::run_backup`].
    pub async fn run_restore(&self, id: &str) -> Result<BackupStatus> {
        retry(&self.retry_policy, || self.store.restore_backup(id)).await?;
        info!(id, "restore started");
        let converged = poll_until(self.poll_interval, self.poll_timeout, || async {
            let status = self.store.restore_status(id).await?;
            Ok::<_, stampede_core::GatewayError>(status != BackupStatus::Started)
        })
        .await;

        let status = self.store.restore_status(id).await?;
        match converged {
            Ok(()) => info!(id, ?status, "restore finished"),
            Err(e) => warn!(id, ?status, error = %e, "restore did not finish in time"),
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::gateway::MemoryGateway;

    fn driver(gateway: Arc<MemoryGateway>) -> BackupDriver {
        BackupDriver::new(gateway)
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO..Duration::from_millis(10)))
    }

    #[tokio::test(start_paused = true)]
    async fn backup_converges_after_a_few_polls() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_backup_poll_latency(3);
        let status = driver(Arc::clone(&gateway)).run_backup("nightly").await.unwrap();
        assert_eq!(status, BackupStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_follows_a_finished_backup() {
        let gateway = Arc::new(MemoryGateway::new());
        let driver = driver(Arc::clone(&gateway));
        driver.run_backup("weekly").await.unwrap();
        let status = driver.run_restore("weekly").await.unwrap();
        assert_eq!(status, BackupStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backup_times_out_with_last_status() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_backup_poll_latency(10_000);
        let driver = driver(Arc::clone(&gateway))
            .with_poll(Duration::from_secs(1), Duration::from_secs(10));
        let status = driver.run_backup("stuck").await.unwrap();
        // Still running when we gave up; not an error.
        assert_eq!(status, BackupStatus::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn restoring_an_unknown_backup_is_an_error() {
        let gateway = Arc::new(MemoryGateway::new());
        let result = driver(Arc::clone(&gateway)).run_restore("missing").await;
        assert!(result.is_err());
    }
}
