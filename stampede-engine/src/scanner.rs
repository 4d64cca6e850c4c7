//! TTL expiry scanner.
//!
//! The sole writer of scheduled `ACTIVE -> COLD` transitions. Each tick reads
//! the TTL ledger for records whose expiration has passed, flips the owning
//! tenants to `COLD` in one batched update, and deletes the consumed records.
//!
//! Exactly one scanner process should run per deployment; concurrent scanners
//! would race on the same ledger records.

use chrono::Utc;
use std::sync::Arc;
use stampede_core::config::ScannerConfig;
use stampede_core::{ActivityStatus, Result, TenantName, TenantStore};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// The TTL expiry scanner.
pub struct ExpiryScanner {
    store: Arc<dyn TenantStore>,
    cfg: ScannerConfig,
}

impl ExpiryScanner {
    /// Build a scanner over the given store.
    pub fn new(store: Arc<dyn TenantStore>, cfg: ScannerConfig) -> Self {
        Self { store, cfg }
    }

    /// Run the scan loop forever.
    ///
    /// Pacing is self-correcting: if a cycle took longer than the tick
    /// interval, the next tick fires immediately instead of double-sleeping.
    /// Tick failures are logged and do not stop the loop.
    pub async fn run(&self) -> Result<()> {
        let mut last_execution = Instant::now();
        loop {
            let elapsed = last_execution.elapsed();
            if elapsed < self.cfg.tick_interval {
                sleep(self.cfg.tick_interval - elapsed).await;
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "scanner tick failed, retrying next interval");
            }
            last_execution = Instant::now();
        }
    }

    /// Process one batch of expired records. Returns how many tenants were
    /// deactivated.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let expired = self.store.expired_ttl_records(now, self.cfg.batch_limit).await?;
        if expired.is_empty() {
            debug!("no expired TTL records");
            return Ok(0);
        }

        // Only flip tenants the lifecycle table allows; a tenant may have
        // been offloaded while its record was pending.
        let names: Vec<TenantName> = expired.iter().map(|e| e.record.tenant_name.clone()).collect();
        let statuses = self.store.get_tenants_by_name(&names).await?;
        let updates: Vec<(TenantName, ActivityStatus)> = names
            .iter()
            .filter(|name| {
                statuses
                    .get(*name)
                    .is_some_and(|status| status.can_transition_to(ActivityStatus::Cold))
            })
            .map(|name| (name.clone(), ActivityStatus::Cold))
            .collect();

        if updates.len() < expired.len() {
            warn!(
                expired = expired.len(),
                eligible = updates.len(),
                "some expired tenants are no longer eligible for deactivation"
            );
        }

        if !updates.is_empty() {
            info!(count = updates.len(), "TTL expired: deactivating tenants");
            self.store.update_tenants(&updates).await?;
        }

        // Records are consumed whether or not the tenant was still eligible.
        for entry in &expired {
            self.store.delete_ttl_record(entry.id).await?;
        }
        Ok(updates.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use stampede_core::gateway::MemoryGateway;
    use stampede_core::TtlRecord;
    use std::time::Duration;

    fn expired_record(index: u64) -> TtlRecord {
        TtlRecord {
            tenant_name: TenantName::from_index(index),
            expiration: Utc::now() - ChronoDuration::seconds(1),
        }
    }

    fn live_record(index: u64) -> TtlRecord {
        TtlRecord {
            tenant_name: TenantName::from_index(index),
            expiration: Utc::now() + ChronoDuration::seconds(3600),
        }
    }

    #[tokio::test]
    async fn expired_tenants_are_deactivated_and_records_consumed() {
        let gateway = Arc::new(MemoryGateway::new());
        for index in 0..3 {
            gateway.seed_tenant(TenantName::from_index(index), ActivityStatus::Active);
        }
        gateway
            .put_ttl_records(&[expired_record(0), expired_record(1), live_record(2)])
            .await
            .unwrap();

        let scanner = ExpiryScanner::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, ScannerConfig::default());
        let deactivated = scanner.tick().await.unwrap();

        assert_eq!(deactivated, 2);
        assert_eq!(gateway.tenant_status(&TenantName::from_index(0)), Some(ActivityStatus::Cold));
        assert_eq!(gateway.tenant_status(&TenantName::from_index(1)), Some(ActivityStatus::Cold));
        assert_eq!(gateway.tenant_status(&TenantName::from_index(2)), Some(ActivityStatus::Active));
        // Only the live record remains.
        let remaining = gateway.ttl_records();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].record.tenant_name, TenantName::from_index(2));
    }

    #[tokio::test]
    async fn tick_without_expired_records_is_a_noop() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed_tenant(TenantName::from_index(0), ActivityStatus::Active);
        gateway.put_ttl_records(&[live_record(0)]).await.unwrap();

        let scanner = ExpiryScanner::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, ScannerConfig::default());
        assert_eq!(scanner.tick().await.unwrap(), 0);
        assert_eq!(gateway.tenant_status(&TenantName::from_index(0)), Some(ActivityStatus::Active));
    }

    #[tokio::test]
    async fn ineligible_tenants_are_skipped_but_their_records_consumed() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed_tenant(TenantName::from_index(0), ActivityStatus::Offloaded);
        gateway.put_ttl_records(&[expired_record(0)]).await.unwrap();

        let scanner = ExpiryScanner::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, ScannerConfig::default());
        assert_eq!(scanner.tick().await.unwrap(), 0);
        // No illegal OFFLOADED -> COLD request was made.
        assert_eq!(gateway.tenant_status(&TenantName::from_index(0)), Some(ActivityStatus::Offloaded));
        assert!(gateway.ttl_records().is_empty());
    }

    #[tokio::test]
    async fn batch_limit_caps_one_tick() {
        let gateway = Arc::new(MemoryGateway::new());
        for index in 0..5 {
            gateway.seed_tenant(TenantName::from_index(index), ActivityStatus::Active);
        }
        let records: Vec<TtlRecord> = (0..5).map(expired_record).collect();
        gateway.put_ttl_records(&records).await.unwrap();

        let cfg = ScannerConfig { batch_limit: 2, tick_interval: Duration::from_secs(10) };
        let scanner = ExpiryScanner::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, cfg);

        assert_eq!(scanner.tick().await.unwrap(), 2);
        assert_eq!(scanner.tick().await.unwrap(), 2);
        assert_eq!(scanner.tick().await.unwrap(), 1);
        assert_eq!(scanner.tick().await.unwrap(), 0);
    }
}
