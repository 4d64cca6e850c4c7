//! Backend gateway: the tenant-partitioned store's API surface.
//!
//! The engine consumes this interface but never implements the store itself.
//! [`HttpGateway`] talks to a real cluster over its HTTP endpoints;
//! [`MemoryGateway`] is a thread-safe in-memory implementation used by tests
//! and local simulations, with hooks for injecting partial failures.
//!
//! The one concurrency contract a gateway must satisfy: a single instance is
//! shared by many concurrent query workers, so every method takes `&self` and
//! implementations must be safe for concurrent use.

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

use crate::lifecycle::ActivityStatus;
use crate::types::{
    BackupStatus, ConsistencyLevel, DataObject, NodeStats, ObjectWriteFailure, QueryHit, TenantName,
    Timestamp, TtlEntry, TtlRecord,
};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Error reported by a backend gateway operation.
///
/// Transient by default: callers route these through the retry and
/// convergence primitives rather than matching on variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never reached the backend, or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend received the request and rejected it.
    #[error("backend error: {0}")]
    Backend(String),

    /// The backend answered with something the client could not interpret.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// The store operations the load engine consumes.
///
/// Batch object writes report per-object failures as data, not as errors: a
/// partially failed batch is expected behavior under load.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Create the named tenants. New tenants start out `ACTIVE`.
    async fn create_tenants(&self, names: &[TenantName]) -> GatewayResult<()>;

    /// Bulk-update tenant activity statuses.
    async fn update_tenants(&self, updates: &[(TenantName, ActivityStatus)]) -> GatewayResult<()>;

    /// Fetch all tenants and their current statuses.
    async fn get_tenants(&self) -> GatewayResult<HashMap<TenantName, ActivityStatus>>;

    /// Fetch the subset of tenants with the given names.
    async fn get_tenants_by_name(
        &self,
        names: &[TenantName],
    ) -> GatewayResult<HashMap<TenantName, ActivityStatus>>;

    /// Upsert a batch of objects into a tenant's partition.
    ///
    /// Returns the per-object failures; an empty vector means the whole batch
    /// was accepted.
    async fn upsert_objects(
        &self,
        tenant: &TenantName,
        objects: &[DataObject],
    ) -> GatewayResult<Vec<ObjectWriteFailure>>;

    /// Run a vector similarity query against a tenant's partition.
    async fn query_similar(
        &self,
        tenant: &TenantName,
        vector: &[f32],
        limit: usize,
        consistency: Option<ConsistencyLevel>,
    ) -> GatewayResult<Vec<QueryHit>>;

    /// Fetch per-node shard statistics for the whole cluster.
    async fn node_stats(&self) -> GatewayResult<Vec<NodeStats>>;

    /// Append TTL records to the ledger, replacing any live record for the
    /// same tenant. Returns per-record failures.
    async fn put_ttl_records(&self, records: &[TtlRecord]) -> GatewayResult<Vec<ObjectWriteFailure>>;

    /// Fetch ledger records with `expiration <= now`, capped at `limit`.
    async fn expired_ttl_records(&self, now: Timestamp, limit: usize) -> GatewayResult<Vec<TtlEntry>>;

    /// Delete a consumed ledger record.
    async fn delete_ttl_record(&self, id: Uuid) -> GatewayResult<()>;

    /// Reset a tenant's TTL record to the given expiration, creating the
    /// record if none is live.
    async fn refresh_ttl(&self, tenant: &TenantName, expiration: Timestamp) -> GatewayResult<()>;

    /// Start a cluster backup under the given identifier.
    async fn create_backup(&self, id: &str) -> GatewayResult<BackupStatus>;

    /// Fetch the status of a running or finished backup.
    async fn backup_status(&self, id: &str) -> GatewayResult<BackupStatus>;

    /// Start restoring the backup with the given identifier.
    async fn restore_backup(&self, id: &str) -> GatewayResult<BackupStatus>;

    /// Fetch the status of a running or finished restore.
    async fn restore_status(&self, id: &str) -> GatewayResult<BackupStatus>;
}
