//! Reactivation sampler.
//!
//! Each cycle a configured percentage of the total tenant population is
//! reactivated from the `FROZEN` pool: the tenant is flipped back to
//! `ACTIVE`, a bounded random subset of its objects is rewritten to simulate
//! write activity, and its TTL record is refreshed to `now + ttl`.

use chrono::Utc;
use rand::seq::{index, SliceRandom};
use std::sync::Arc;
use stampede_core::config::SamplerConfig;
use stampede_core::{
    lifecycle, ActivityStatus, DataObject, Result, TenantName, TenantStore,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

/// The reactivation sampler.
pub struct ReactivationSampler {
    store: Arc<dyn TenantStore>,
    cfg: SamplerConfig,
}

/// How many tenants one cycle reactivates: the configured percentage of the
/// whole population, bounded above by the number of frozen tenants.
#[must_use]
pub fn sample_size(total_tenants: usize, frozen_tenants: usize, percentage: u32) -> usize {
    if total_tenants == 0 || frozen_tenants == 0 {
        return 0;
    }
    (total_tenants * percentage as usize / 100).min(frozen_tenants)
}

impl ReactivationSampler {
    /// Build a sampler over the given store.
    pub fn new(store: Arc<dyn TenantStore>, cfg: SamplerConfig) -> Self {
        Self { store, cfg }
    }

    /// Run the sampling loop forever, with self-correcting pacing.
    pub async fn run(&self) -> Result<()> {
        let mut last_execution = Instant::now();
        loop {
            let elapsed = last_execution.elapsed();
            if elapsed < self.cfg.tick_interval {
                sleep(self.cfg.tick_interval - elapsed).await;
            }
            if let Err(e) = self.cycle().await {
                error!(error = %e, "reactivation cycle failed, retrying next interval");
            }
            last_execution = Instant::now();
        }
    }

    /// Reactivate one sampled batch of frozen tenants. Returns how many
    /// tenants were reactivated.
    pub async fn cycle(&self) -> Result<usize> {
        let tenants = self.store.get_tenants().await?;
        let frozen: Vec<TenantName> = tenants
            .iter()
            .filter(|(_, status)| **status == ActivityStatus::Frozen)
            .map(|(name, _)| name.clone())
            .collect();

        let wanted = sample_size(tenants.len(), frozen.len(), self.cfg.percentage_of_tenants);
        if wanted == 0 {
            debug!(frozen = frozen.len(), "nothing to reactivate");
            return Ok(0);
        }

        let sampled: Vec<TenantName> = {
            let mut rng = rand::thread_rng();
            frozen.choose_multiple(&mut rng, wanted).cloned().collect()
        };

        info!(count = sampled.len(), "enabling tenants");
        for tenant in &sampled {
            lifecycle::ensure_legal(ActivityStatus::Frozen, ActivityStatus::Active)?;
            self.store.update_tenants(&[(tenant.clone(), ActivityStatus::Active)]).await?;
            self.rewrite_object_subset(tenant).await?;
            let expiration = Utc::now() + chrono::Duration::seconds(self.cfg.ttl.as_secs() as i64);
            self.store.refresh_ttl(tenant, expiration).await?;
        }
        Ok(sampled.len())
    }

    /// Rewrite a random subset of a tenant's objects. Deterministic ids make
    /// each rewrite an upsert of an existing object.
    async fn rewrite_object_subset(&self, tenant: &TenantName) -> Result<()> {
        let objects: Vec<DataObject> = {
            let mut rng = rand::thread_rng();
            let subset = index::sample(
                &mut rng,
                self.cfg.objects_per_tenant as usize,
                self.cfg.objects_to_update as usize,
            );
            subset
                .into_iter()
                .map(|i| DataObject::random(i as u64, self.cfg.vector_dimensions, &mut rng))
                .collect()
        };

        let failures = self.store.upsert_objects(tenant, &objects).await?;
        for failure in &failures {
            error!(%tenant, object_id = %failure.object_id, "object rewrite rejected: {}", failure.message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stampede_core::gateway::MemoryGateway;

    fn small_config() -> SamplerConfig {
        SamplerConfig {
            objects_per_tenant: 20,
            objects_to_update: 5,
            vector_dimensions: 4,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn sample_size_is_bounded_by_frozen_pool() {
        // 30% of 10 tenants is 3, but only 2 are frozen.
        assert_eq!(sample_size(10, 2, 30), 2);
        assert_eq!(sample_size(10, 5, 30), 3);
        assert_eq!(sample_size(0, 0, 30), 0);
        assert_eq!(sample_size(10, 0, 30), 0);
        assert_eq!(sample_size(3, 3, 100), 3);
    }

    proptest! {
        #[test]
        fn sample_size_never_exceeds_either_bound(
            total in 0usize..10_000,
            frozen in 0usize..10_000,
            percentage in 0u32..=100,
        ) {
            let n = sample_size(total, frozen, percentage);
            prop_assert!(n <= frozen);
            prop_assert!(n <= total * percentage as usize / 100 + 1);
        }
    }

    #[tokio::test]
    async fn cycle_reactivates_refreshes_and_rewrites() {
        let gateway = Arc::new(MemoryGateway::new());
        // 4 tenants, all frozen; 100% sampling reactivates every one.
        for index in 0..4 {
            gateway.seed_tenant(TenantName::from_index(index), ActivityStatus::Frozen);
        }
        let cfg = SamplerConfig { percentage_of_tenants: 100, ..small_config() };
        let sampler = ReactivationSampler::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, cfg);

        let enabled = sampler.cycle().await.unwrap();
        assert_eq!(enabled, 4);
        for index in 0..4 {
            let name = TenantName::from_index(index);
            assert_eq!(gateway.tenant_status(&name), Some(ActivityStatus::Active));
            // The rewrite touched exactly the configured subset size.
            assert_eq!(gateway.object_count(&name), 5);
        }
        // Every reactivated tenant got a fresh TTL record.
        let records = gateway.ttl_records();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|entry| entry.record.expiration > Utc::now()));
    }

    #[tokio::test]
    async fn cycle_samples_a_percentage_of_the_population() {
        let gateway = Arc::new(MemoryGateway::new());
        // 10 tenants total, 6 frozen, 30% sampling -> 3 reactivated.
        for index in 0..6 {
            gateway.seed_tenant(TenantName::from_index(index), ActivityStatus::Frozen);
        }
        for index in 6..10 {
            gateway.seed_tenant(TenantName::from_index(index), ActivityStatus::Active);
        }
        let sampler =
            ReactivationSampler::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, small_config());

        assert_eq!(sampler.cycle().await.unwrap(), 3);
        let tenants = gateway.get_tenants().await.unwrap();
        let frozen_left = tenants.values().filter(|s| **s == ActivityStatus::Frozen).count();
        assert_eq!(frozen_left, 3);
    }

    #[tokio::test]
    async fn cycle_without_frozen_tenants_is_a_noop() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.seed_tenant(TenantName::from_index(0), ActivityStatus::Active);
        let sampler =
            ReactivationSampler::new(Arc::clone(&gateway) as Arc<dyn TenantStore>, small_config());
        assert_eq!(sampler.cycle().await.unwrap(), 0);
    }
}
