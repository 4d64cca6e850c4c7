//! End-to-end lifecycle flow across all drivers, against the in-memory
//! gateway: import, TTL expiry, reactivation, tier migration and querying.

use chrono::Utc;
use stampede_core::config::{ImporterConfig, MigrationConfig, QueryConfig, SamplerConfig, ScannerConfig};
use stampede_core::gateway::MemoryGateway;
use stampede_core::{ActivityStatus, EngineMetrics, RetryPolicy, TenantName, TenantStore};
use stampede_engine::{
    BatchImporter, Direction, ExpiryScanner, QueryLoadGenerator, ReactivationSampler, TierMigrator,
};
use std::sync::Arc;
use std::time::Duration;

fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO..Duration::from_millis(5))
}

#[tokio::test(start_paused = true)]
async fn tenants_churn_through_the_whole_lifecycle() {
    let gateway = Arc::new(MemoryGateway::new());
    let store: Arc<dyn TenantStore> = Arc::clone(&gateway) as Arc<dyn TenantStore>;
    let metrics = Arc::new(EngineMetrics::new());

    // Import a window of six tenants with deterministic objects.
    let importer_cfg = ImporterConfig {
        tenants_per_cycle: 6,
        objects_per_tenant: 120,
        vector_dimensions: 8,
        ..ImporterConfig::default()
    };
    let importer = BatchImporter::new(Arc::clone(&store), Arc::clone(&metrics), importer_cfg)
        .with_retry_policy(quick_retry());
    let report = importer.run_cycle(0, 6).await.unwrap();
    assert_eq!(report.tenants_created, 6);
    assert_eq!(report.objects_written, 6 * 120);

    // Backdate two TTL records; the scanner deactivates exactly those.
    let past = Utc::now() - chrono::Duration::seconds(5);
    for index in 0..2 {
        gateway.refresh_ttl(&TenantName::from_index(index), past).await.unwrap();
    }
    let scanner = ExpiryScanner::new(Arc::clone(&store), ScannerConfig::default());
    assert_eq!(scanner.tick().await.unwrap(), 2);
    assert_eq!(gateway.tenant_status(&TenantName::from_index(0)), Some(ActivityStatus::Cold));
    assert_eq!(gateway.tenant_status(&TenantName::from_index(5)), Some(ActivityStatus::Active));

    // The backend froze one deactivated tenant; the sampler re-enables it
    // and gives it a fresh TTL.
    gateway.seed_tenant(TenantName::from_index(0), ActivityStatus::Frozen);
    let sampler_cfg = SamplerConfig {
        percentage_of_tenants: 100,
        objects_per_tenant: 120,
        objects_to_update: 30,
        vector_dimensions: 8,
        ..SamplerConfig::default()
    };
    let sampler = ReactivationSampler::new(Arc::clone(&store), sampler_cfg);
    assert_eq!(sampler.cycle().await.unwrap(), 1);
    assert_eq!(gateway.tenant_status(&TenantName::from_index(0)), Some(ActivityStatus::Active));
    let refreshed = gateway
        .ttl_records()
        .into_iter()
        .find(|entry| entry.record.tenant_name == TenantName::from_index(0))
        .expect("reactivated tenant must hold a live TTL record");
    assert!(refreshed.record.expiration > Utc::now());

    // Offload the whole population, then bring it back.
    let migration_cfg =
        MigrationConfig { total_tenants: 6, tenants_per_cycle: 4, ..MigrationConfig::default() };
    let offloader = TierMigrator::new(
        Arc::clone(&store),
        Arc::clone(&metrics),
        migration_cfg.clone(),
        Direction::Offload,
    )
    .with_retry_policy(quick_retry());
    let report = offloader.run().await.unwrap();
    assert_eq!(report.moved, 6);
    assert_eq!(report.batches, 2);

    let onloader =
        TierMigrator::new(Arc::clone(&store), Arc::clone(&metrics), migration_cfg, Direction::Onload)
            .with_retry_policy(quick_retry());
    let report = onloader.run().await.unwrap();
    assert_eq!(report.moved, 6);
    let tenants = gateway.get_tenants().await.unwrap();
    assert!(tenants.values().all(|s| *s == ActivityStatus::Active));

    // With everything serving again, a query campaign sees full result sets.
    let query_cfg = QueryConfig {
        tenants: 4,
        parallel_queries_per_tenant: 2,
        queries_per_tenant: 5,
        queries_per_minute: 600,
        min_object_count: 100,
        vector_dimensions: 8,
        replication_factor: 1,
    };
    let generator = QueryLoadGenerator::new(Arc::clone(&store), Arc::clone(&metrics), query_cfg);
    let report = generator.run().await.unwrap();
    assert_eq!(report.workers, 8);
    assert_eq!(report.issued, 40);
    assert_eq!(report.failures, 0);

    // The whole flow surfaced in the exported metrics.
    let rendered = metrics.render();
    assert!(rendered.contains("tenants_added_total 6"));
    assert!(rendered.contains("tenants_offloaded_total 6"));
    assert!(rendered.contains("tenants_onloaded_total 6"));
    assert!(rendered.contains("query_result_total{result=\"success\"} 40"));
}
