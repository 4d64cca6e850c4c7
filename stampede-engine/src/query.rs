//! Query load generator.
//!
//! Sustains similarity-query traffic against a sample of sufficiently
//! populated tenants. One task is spawned per (tenant × parallel-replica)
//! worker identity and all of them are joined before the run returns: a
//! fixed fan-out/fan-in barrier, not a dynamic pool.
//!
//! Each worker paces itself with a uniformly random wait in
//! `[0, 2 × 60/queries_per_minute)`, which keeps the average rate at the
//! target while spreading worker phases apart.

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use stampede_core::config::QueryConfig;
use stampede_core::types::{random_vector, ConsistencyLevel};
use stampede_core::{EngineMetrics, Result, TenantName, TenantStore};
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

/// Result set size requested from every similarity query.
const QUERY_RESULT_LIMIT: usize = 10;

/// Aggregate outcome of one query run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryRunReport {
    /// Queries issued across all workers.
    pub issued: u64,
    /// Queries that returned a full result set.
    pub successes: u64,
    /// Queries that errored or came back short.
    pub failures: u64,
    /// Worker identities spawned.
    pub workers: usize,
    /// Tenant sample size the workers were derived from.
    pub sampled_tenants: usize,
}

#[derive(Debug, Clone, Copy)]
struct WorkerParams {
    queries: u64,
    queries_per_minute: u32,
    vector_dimensions: usize,
    consistency: Option<ConsistencyLevel>,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    issued: u64,
    successes: u64,
    failures: u64,
}

/// The query load generator.
pub struct QueryLoadGenerator {
    store: Arc<dyn TenantStore>,
    metrics: Arc<EngineMetrics>,
    cfg: QueryConfig,
}

impl QueryLoadGenerator {
    /// Build a generator over the given store.
    pub fn new(store: Arc<dyn TenantStore>, metrics: Arc<EngineMetrics>, cfg: QueryConfig) -> Self {
        Self { store, metrics, cfg }
    }

    /// Run one full query campaign and join every worker.
    pub async fn run(&self) -> Result<QueryRunReport> {
        let eligible = self.queryable_tenants().await?;
        if eligible.is_empty() {
            warn!("no tenants hold enough objects to query yet");
            return Ok(QueryRunReport::default());
        }

        let sample: Vec<TenantName> = {
            let mut rng = rand::thread_rng();
            (0..self.cfg.tenants)
                .filter_map(|_| eligible.choose(&mut rng).cloned())
                .collect()
        };

        let params = WorkerParams {
            queries: self.cfg.queries_per_tenant,
            queries_per_minute: self.cfg.queries_per_minute,
            vector_dimensions: self.cfg.vector_dimensions,
            consistency: if self.cfg.replication_factor > 1 {
                Some(ConsistencyLevel::One)
            } else {
                None
            },
        };

        self.metrics.querying_tenants_add(sample.len() as i64);
        let mut workers = JoinSet::new();
        for tenant in sample.iter().cloned().cycle().take(sample.len() * self.cfg.parallel_queries_per_tenant)
        {
            let store = Arc::clone(&self.store);
            let metrics = Arc::clone(&self.metrics);
            workers.spawn(query_worker(store, metrics, tenant, params));
        }

        let mut report = QueryRunReport {
            workers: workers.len(),
            sampled_tenants: sample.len(),
            ..QueryRunReport::default()
        };
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => {
                    report.issued += stats.issued;
                    report.successes += stats.successes;
                    report.failures += stats.failures;
                }
                Err(e) => error!(error = %e, "query worker aborted"),
            }
        }
        self.metrics.querying_tenants_add(-(sample.len() as i64));
        Ok(report)
    }

    /// Tenants with enough objects to be worth querying, from cluster shard
    /// statistics. Freshly created tenants are skipped.
    async fn queryable_tenants(&self) -> Result<Vec<TenantName>> {
        let nodes = self.store.node_stats().await?;
        let mut eligible: Vec<TenantName> = nodes
            .into_iter()
            .flat_map(|node| node.shards)
            .filter(|shard| shard.object_count >= self.cfg.min_object_count)
            .map(|shard| shard.tenant_name)
            .collect();
        eligible.sort();
        eligible.dedup();
        Ok(eligible)
    }
}

/// One worker identity: a fixed number of paced queries against one tenant.
///
/// Every failure is caught, logged and counted; nothing aborts the worker.
async fn query_worker(
    store: Arc<dyn TenantStore>,
    metrics: Arc<EngineMetrics>,
    tenant: TenantName,
    params: WorkerParams,
) -> WorkerStats {
    let avg_wait = 60.0 / f64::from(params.queries_per_minute);
    let mut stats = WorkerStats::default();
    metrics.querying_users_add(1);

    for i in 0..params.queries {
        let wait = {
            let mut rng = rand::thread_rng();
            2.0 * rng.gen::<f64>() * avg_wait
        };
        sleep(Duration::from_secs_f64(wait)).await;

        let vector = {
            let mut rng = rand::thread_rng();
            random_vector(params.vector_dimensions, &mut rng)
        };
        let started = Instant::now();
        let outcome = store
            .query_similar(&tenant, &vector, QUERY_RESULT_LIMIT, params.consistency)
            .await;
        metrics.query_duration(started.elapsed());

        let success = match outcome {
            Ok(hits) if hits.len() >= QUERY_RESULT_LIMIT => true,
            Ok(hits) => {
                error!(%tenant, got = hits.len(), "missing results, requested {QUERY_RESULT_LIMIT}");
                false
            }
            Err(e) => {
                error!(%tenant, error = %e, "query failed");
                false
            }
        };
        metrics.query_result(success);
        stats.issued += 1;
        if success {
            stats.successes += 1;
        } else {
            stats.failures += 1;
        }

        if i % 100 == 0 {
            debug!(%tenant, progress = i, total = params.queries, "query progress");
        }
    }

    metrics.querying_users_add(-1);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::gateway::MemoryGateway;
    use stampede_core::{ActivityStatus, DataObject};

    async fn seed_objects(gateway: &MemoryGateway, tenant: &TenantName, count: u64) {
        gateway.seed_tenant(tenant.clone(), ActivityStatus::Active);
        let objects: Vec<DataObject> = {
            let mut rng = rand::thread_rng();
            (0..count).map(|i| DataObject::random(i, 4, &mut rng)).collect()
        };
        gateway.upsert_objects(tenant, &objects).await.unwrap();
    }

    fn generator(gateway: Arc<MemoryGateway>, cfg: QueryConfig) -> QueryLoadGenerator {
        QueryLoadGenerator::new(gateway, Arc::new(EngineMetrics::new()), cfg)
    }

    #[tokio::test]
    async fn underpopulated_tenants_are_not_sampled() {
        let gateway = Arc::new(MemoryGateway::new());
        let full = TenantName::from_index(0);
        let fresh = TenantName::from_index(1);
        seed_objects(&gateway, &full, 120).await;
        seed_objects(&gateway, &fresh, 3).await;

        let cfg = QueryConfig {
            tenants: 4,
            parallel_queries_per_tenant: 1,
            queries_per_tenant: 1,
            vector_dimensions: 4,
            ..QueryConfig::default()
        };
        let generator = generator(Arc::clone(&gateway), cfg);
        let eligible = generator.queryable_tenants().await.unwrap();
        assert_eq!(eligible, vec![full]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_holds_the_target_rate() {
        let gateway = Arc::new(MemoryGateway::new());
        let tenant = TenantName::from_index(0);
        seed_objects(&gateway, &tenant, 200).await;

        // 60 queries/minute over 600 queries is ten minutes of traffic on
        // average; randomized pacing stays within a generous band of that.
        let cfg = QueryConfig {
            tenants: 1,
            parallel_queries_per_tenant: 1,
            queries_per_tenant: 600,
            queries_per_minute: 60,
            min_object_count: 100,
            vector_dimensions: 4,
            replication_factor: 1,
        };
        let started = Instant::now();
        let report = generator(Arc::clone(&gateway), cfg).run().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.workers, 1);
        assert_eq!(report.issued, 600);
        assert_eq!(report.failures, 0);
        assert!(elapsed >= Duration::from_secs(480), "ran too fast: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(720), "ran too slow: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn short_result_sets_count_as_failures() {
        let gateway = Arc::new(MemoryGateway::new());
        let tenant = TenantName::from_index(0);
        // Enough objects to be sampled, too few to fill a 10-hit result set.
        seed_objects(&gateway, &tenant, 5).await;

        let cfg = QueryConfig {
            tenants: 1,
            parallel_queries_per_tenant: 1,
            queries_per_tenant: 20,
            queries_per_minute: 600,
            min_object_count: 1,
            vector_dimensions: 4,
            replication_factor: 1,
        };
        let report = generator(Arc::clone(&gateway), cfg).run().await.unwrap();
        assert_eq!(report.issued, 20);
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn query_errors_never_abort_a_worker() {
        let gateway = Arc::new(MemoryGateway::new());
        let tenant = TenantName::from_index(0);
        seed_objects(&gateway, &tenant, 150).await;
        // Deactivated after seeding: stats still show objects, queries error.
        gateway.seed_tenant(tenant.clone(), ActivityStatus::Cold);

        let cfg = QueryConfig {
            tenants: 2,
            parallel_queries_per_tenant: 2,
            queries_per_tenant: 10,
            queries_per_minute: 600,
            min_object_count: 100,
            vector_dimensions: 4,
            replication_factor: 1,
        };
        let report = generator(Arc::clone(&gateway), cfg).run().await.unwrap();
        assert_eq!(report.workers, 4);
        assert_eq!(report.issued, 40);
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_spawns_one_worker_per_replica() {
        let gateway = Arc::new(MemoryGateway::new());
        for index in 0..3 {
            seed_objects(&gateway, &TenantName::from_index(index), 110).await;
        }
        let cfg = QueryConfig {
            tenants: 3,
            parallel_queries_per_tenant: 4,
            queries_per_tenant: 2,
            queries_per_minute: 600,
            min_object_count: 100,
            vector_dimensions: 4,
            replication_factor: 1,
        };
        let report = generator(Arc::clone(&gateway), cfg).run().await.unwrap();
        assert_eq!(report.sampled_tenants, 3);
        assert_eq!(report.workers, 12);
        assert_eq!(report.issued, 24);
    }
}
