//! In-memory gateway for tests and local simulations.
//!
//! Implements the full [`TenantStore`] surface against process-local state,
//! with hooks for injecting the failure modes the engine must tolerate:
//! per-object batch rejections, transient listing errors and slow backup
//! convergence.

use super::{GatewayError, GatewayResult, TenantStore};
use crate::lifecycle::ActivityStatus;
use crate::types::{
    BackupStatus, ConsistencyLevel, DataObject, NodeStats, ObjectWriteFailure, QueryHit, ShardStats,
    TenantName, Timestamp, TtlEntry, TtlRecord,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    tenants: HashMap<TenantName, ActivityStatus>,
    objects: HashMap<TenantName, HashMap<Uuid, DataObject>>,
    ttl: HashMap<Uuid, TtlRecord>,
    backups: HashMap<String, ConvergingStatus>,
    restores: HashMap<String, ConvergingStatus>,
}

/// A backup/restore that reaches its final status after a fixed number of
/// status polls, emulating an asynchronous backend job.
#[derive(Debug, Clone)]
struct ConvergingStatus {
    polls_remaining: usize,
    outcome: BackupStatus,
}

/// Thread-safe in-memory [`TenantStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: RwLock<StoreState>,
    failing_objects: RwLock<HashSet<Uuid>>,
    list_failures: AtomicUsize,
    name_lookup_lag: AtomicUsize,
    backup_poll_latency: AtomicUsize,
}

impl MemoryGateway {
    /// Create an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tenant with the given status, bypassing lifecycle rules.
    pub fn seed_tenant(&self, name: TenantName, status: ActivityStatus) {
        self.state.write().tenants.insert(name, status);
    }

    /// Current status of a tenant, if it exists.
    pub fn tenant_status(&self, name: &TenantName) -> Option<ActivityStatus> {
        self.state.read().tenants.get(name).copied()
    }

    /// Number of objects currently stored for a tenant.
    pub fn object_count(&self, name: &TenantName) -> usize {
        self.state.read().objects.get(name).map_or(0, HashMap::len)
    }

    /// Fetch a stored object by id.
    pub fn object(&self, name: &TenantName, id: Uuid) -> Option<DataObject> {
        self.state.read().objects.get(name).and_then(|m| m.get(&id)).cloned()
    }

    /// All live TTL records.
    pub fn ttl_records(&self) -> Vec<TtlEntry> {
        self.state
            .read()
            .ttl
            .iter()
            .map(|(id, record)| TtlEntry { id: *id, record: record.clone() })
            .collect()
    }

    /// Reject future writes of the given object ids, reporting them as
    /// per-object batch failures.
    pub fn fail_object_writes(&self, ids: impl IntoIterator<Item = Uuid>) {
        self.failing_objects.write().extend(ids);
    }

    /// Make the next `n` tenant listings fail with a transport error.
    pub fn fail_next_tenant_lists(&self, n: usize) {
        self.list_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` by-name lookups come back empty, emulating an
    /// eventually-consistent backend that has not yet caught up.
    pub fn lag_name_lookups(&self, n: usize) {
        self.name_lookup_lag.store(n, Ordering::SeqCst);
    }

    /// Number of status polls a backup or restore stays in `STARTED` before
    /// reporting its outcome. Defaults to zero (immediate convergence).
    pub fn set_backup_poll_latency(&self, polls: usize) {
        self.backup_poll_latency.store(polls, Ordering::SeqCst);
    }

    fn take_list_failure(&self) -> bool {
        self.list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn poll_converging(entry: Option<&mut ConvergingStatus>, id: &str) -> GatewayResult<BackupStatus> {
        let job = entry.ok_or_else(|| GatewayError::Backend(format!("unknown job: {id}")))?;
        if job.polls_remaining == 0 {
            return Ok(job.outcome);
        }
        job.polls_remaining -= 1;
        Ok(BackupStatus::Started)
    }
}

#[async_trait]
impl TenantStore for MemoryGateway {
    async fn create_tenants(&self, names: &[TenantName]) -> GatewayResult<()> {
        let mut state = self.state.write();
        for name in names {
            state.tenants.entry(name.clone()).or_insert(ActivityStatus::Active);
        }
        Ok(())
    }

    async fn update_tenants(&self, updates: &[(TenantName, ActivityStatus)]) -> GatewayResult<()> {
        let mut state = self.state.write();
        for (name, _) in updates {
            if !state.tenants.contains_key(name) {
                return Err(GatewayError::Backend(format!("unknown tenant: {name}")));
            }
        }
        for (name, status) in updates {
            state.tenants.insert(name.clone(), *status);
        }
        Ok(())
    }

    async fn get_tenants(&self) -> GatewayResult<HashMap<TenantName, ActivityStatus>> {
        if self.take_list_failure() {
            return Err(GatewayError::Transport("injected listing failure".into()));
        }
        Ok(self.state.read().tenants.clone())
    }

    async fn get_tenants_by_name(
        &self,
        names: &[TenantName],
    ) -> GatewayResult<HashMap<TenantName, ActivityStatus>> {
        if self
            .name_lookup_lag
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(HashMap::new());
        }
        let state = self.state.read();
        Ok(names
            .iter()
            .filter_map(|name| state.tenants.get(name).map(|status| (name.clone(), *status)))
            .collect())
    }

    async fn upsert_objects(
        &self,
        tenant: &TenantName,
        objects: &[DataObject],
    ) -> GatewayResult<Vec<ObjectWriteFailure>> {
        let mut state = self.state.write();
        if !state.tenants.contains_key(tenant) {
            return Err(GatewayError::Backend(format!("unknown tenant: {tenant}")));
        }
        let failing = self.failing_objects.read();
        let partition = state.objects.entry(tenant.clone()).or_default();
        let mut failures = Vec::new();
        for object in objects {
            if failing.contains(&object.id) {
                failures.push(ObjectWriteFailure {
                    object_id: object.id,
                    message: "injected write failure".into(),
                });
            } else {
                partition.insert(object.id, object.clone());
            }
        }
        Ok(failures)
    }

    async fn query_similar(
        &self,
        tenant: &TenantName,
        _vector: &[f32],
        limit: usize,
        _consistency: Option<ConsistencyLevel>,
    ) -> GatewayResult<Vec<QueryHit>> {
        let state = self.state.read();
        match state.tenants.get(tenant) {
            None => return Err(GatewayError::Backend(format!("unknown tenant: {tenant}"))),
            Some(ActivityStatus::Active) => {}
            Some(status) => {
                return Err(GatewayError::Backend(format!("tenant {tenant} is {status}, not queryable")))
            }
        }
        let empty = HashMap::new();
        let partition = state.objects.get(tenant).unwrap_or(&empty);
        Ok(partition.keys().take(limit).map(|id| QueryHit { id: *id, distance: 0.0 }).collect())
    }

    async fn node_stats(&self) -> GatewayResult<Vec<NodeStats>> {
        let state = self.state.read();
        let shards = state
            .tenants
            .keys()
            .map(|name| ShardStats {
                tenant_name: name.clone(),
                object_count: state.objects.get(name).map_or(0, |m| m.len() as u64),
            })
            .collect();
        Ok(vec![NodeStats { name: "node-0".into(), shards }])
    }

    async fn put_ttl_records(&self, records: &[TtlRecord]) -> GatewayResult<Vec<ObjectWriteFailure>> {
        let mut state = self.state.write();
        for record in records {
            // At most one live record per tenant.
            state.ttl.retain(|_, existing| existing.tenant_name != record.tenant_name);
            state.ttl.insert(Uuid::new_v4(), record.clone());
        }
        Ok(Vec::new())
    }

    async fn expired_ttl_records(&self, now: Timestamp, limit: usize) -> GatewayResult<Vec<TtlEntry>> {
        let state = self.state.read();
        Ok(state
            .ttl
            .iter()
            .filter(|(_, record)| record.expiration <= now)
            .take(limit)
            .map(|(id, record)| TtlEntry { id: *id, record: record.clone() })
            .collect())
    }

    async fn delete_ttl_record(&self, id: Uuid) -> GatewayResult<()> {
        self.state.write().ttl.remove(&id);
        Ok(())
    }

    async fn refresh_ttl(&self, tenant: &TenantName, expiration: Timestamp) -> GatewayResult<()> {
        let mut state = self.state.write();
        let existing = state.ttl.values_mut().find(|record| &record.tenant_name == tenant);
        match existing {
            Some(record) => record.expiration = expiration,
            None => {
                let record = TtlRecord { tenant_name: tenant.clone(), expiration };
                state.ttl.insert(Uuid::new_v4(), record);
            }
        }
        Ok(())
    }

    async fn create_backup(&self, id: &str) -> GatewayResult<BackupStatus> {
        let polls = self.backup_poll_latency.load(Ordering::SeqCst);
        self.state.write().backups.insert(
            id.to_string(),
            ConvergingStatus { polls_remaining: polls, outcome: BackupStatus::Success },
        );
        Ok(BackupStatus::Started)
    }

    async fn backup_status(&self, id: &str) -> GatewayResult<BackupStatus> {
        let mut state = self.state.write();
        Self::poll_converging(state.backups.get_mut(id), id)
    }

    async fn restore_backup(&self, id: &str) -> GatewayResult<BackupStatus> {
        if !self.state.read().backups.contains_key(id) {
            return Err(GatewayError::Backend(format!("unknown backup: {id}")));
        }
        let polls = self.backup_poll_latency.load(Ordering::SeqCst);
        self.state.write().restores.insert(
            id.to_string(),
            ConvergingStatus { polls_remaining: polls, outcome: BackupStatus::Success },
        );
        Ok(BackupStatus::Started)
    }

    async fn restore_status(&self, id: &str) -> GatewayResult<BackupStatus> {
        let mut state = self.state.write();
        Self::poll_converging(state.restores.get_mut(id), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn create_is_idempotent_and_preserves_status() {
        let gateway = MemoryGateway::new();
        let name = TenantName::from_index(1);
        gateway.create_tenants(&[name.clone()]).await.unwrap();
        gateway.update_tenants(&[(name.clone(), ActivityStatus::Cold)]).await.unwrap();
        // Re-creating an existing tenant must not reset its status.
        gateway.create_tenants(&[name.clone()]).await.unwrap();
        assert_eq!(gateway.tenant_status(&name), Some(ActivityStatus::Cold));
    }

    #[tokio::test]
    async fn ttl_records_are_unique_per_tenant() {
        let gateway = MemoryGateway::new();
        let record = TtlRecord { tenant_name: TenantName::from_index(3), expiration: Utc::now() };
        gateway.put_ttl_records(std::slice::from_ref(&record)).await.unwrap();
        gateway.put_ttl_records(std::slice::from_ref(&record)).await.unwrap();
        assert_eq!(gateway.ttl_records().len(), 1);
    }

    #[tokio::test]
    async fn injected_listing_failures_are_transient() {
        let gateway = MemoryGateway::new();
        gateway.fail_next_tenant_lists(2);
        assert!(gateway.get_tenants().await.is_err());
        assert!(gateway.get_tenants().await.is_err());
        assert!(gateway.get_tenants().await.is_ok());
    }

    #[tokio::test]
    async fn non_active_tenants_are_not_queryable() {
        let gateway = MemoryGateway::new();
        let name = TenantName::from_index(5);
        gateway.seed_tenant(name.clone(), ActivityStatus::Offloaded);
        let result = gateway.query_similar(&name, &[0.0; 4], 10, None).await;
        assert!(matches!(result, Err(GatewayError::Backend(_))));
    }
}
