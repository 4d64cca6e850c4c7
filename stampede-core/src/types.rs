//! Common types used throughout the stampede engine.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type for TTL expirations and telemetry.
pub type Timestamp = DateTime<Utc>;

/// Unique tenant identity within the shared cluster.
///
/// Tenants created by the import engine derive their name from a numeric
/// index so that repeated runs address the same tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantName(String);

impl TenantName {
    /// Create a tenant name from an arbitrary string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the canonical name for a numeric tenant index.
    ///
    /// Zero-padded so that lexical and numeric ordering agree.
    #[must_use]
    pub fn from_index(index: u64) -> Self {
        Self(format!("tenant_{index:010}"))
    }

    /// Get the raw tenant name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A single object record within a tenant's partition.
///
/// The identifier is deterministically derived from the object's index within
/// its tenant, so re-importing the same (tenant, index) pair overwrites the
/// same object instead of inserting a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    /// Deterministic identifier, see [`DataObject::id_for_index`].
    pub id: Uuid,
    /// First integer payload field.
    pub int1: i64,
    /// Second integer payload field.
    pub int2: i64,
    /// First floating-point payload field.
    pub number1: f64,
    /// Second floating-point payload field.
    pub number2: f64,
    /// First free-text payload field.
    pub text1: String,
    /// Second free-text payload field.
    pub text2: String,
    /// Fixed-dimension embedding vector.
    pub vector: Vec<f32>,
}

impl DataObject {
    /// The identifier assigned to the object at `index` within any tenant.
    #[must_use]
    pub fn id_for_index(index: u64) -> Uuid {
        Uuid::from_u128(u128::from(index))
    }

    /// Generate a random payload for the object at `index`.
    ///
    /// Only the identifier is deterministic; all payload fields and the
    /// embedding are randomized on every call.
    pub fn random(index: u64, dimensions: usize, rng: &mut impl Rng) -> Self {
        Self {
            id: Self::id_for_index(index),
            int1: rng.gen_range(0..=10_000),
            int2: rng.gen_range(0..=10_000),
            number1: rng.gen(),
            number2: rng.gen(),
            text1: rng.gen_range(0..=10_000i64).to_string(),
            text2: rng.gen_range(0..=10_000i64).to_string(),
            vector: random_vector(dimensions, rng),
        }
    }
}

/// Generate a random embedding of the given dimensionality.
pub fn random_vector(dimensions: usize, rng: &mut impl Rng) -> Vec<f32> {
    (0..dimensions).map(|_| rng.gen::<f32>()).collect()
}

/// A live entry in the TTL ledger.
///
/// At most one live record exists per tenant name. An expired record that has
/// not yet been processed by the scanner is considered pending deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlRecord {
    /// Name-based weak reference to the owning tenant.
    pub tenant_name: TenantName,
    /// Absolute UTC timestamp at which the tenant's data expires.
    pub expiration: Timestamp,
}

/// A TTL record together with its ledger identity, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlEntry {
    /// Ledger-assigned identifier, used to delete the consumed record.
    pub id: Uuid,
    /// The record itself.
    #[serde(flatten)]
    pub record: TtlRecord,
}

/// Per-object failure reported by a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectWriteFailure {
    /// Identifier of the rejected object.
    pub object_id: Uuid,
    /// Backend-provided failure message.
    pub message: String,
}

/// A single hit in a similarity query result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Identifier of the matched object.
    pub id: Uuid,
    /// Distance to the query vector, smaller is closer.
    pub distance: f32,
}

/// Consistency level requested for a query against a replicated cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// A single replica must answer.
    One,
    /// A majority of replicas must answer.
    Quorum,
    /// All replicas must answer.
    All,
}

/// Status of a backup or restore operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    /// The operation has been accepted and is in progress.
    Started,
    /// The operation completed successfully.
    Success,
    /// The operation failed.
    Failed,
}

/// Statistics for a single shard (one tenant's partition on one node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Tenant the shard belongs to.
    pub tenant_name: TenantName,
    /// Number of objects currently held by the shard.
    pub object_count: u64,
}

/// Statistics for a single cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Node identity.
    pub name: String,
    /// Shards hosted on the node.
    pub shards: Vec<ShardStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_name_is_zero_padded() {
        assert_eq!(TenantName::from_index(0).as_str(), "tenant_0000000000");
        assert_eq!(TenantName::from_index(42).as_str(), "tenant_0000000042");
        assert_eq!(TenantName::from_index(9_999_999).as_str(), "tenant_0009999999");
    }

    #[test]
    fn tenant_name_ordering_matches_index_ordering() {
        let a = TenantName::from_index(9);
        let b = TenantName::from_index(10);
        let c = TenantName::from_index(100);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn object_id_is_deterministic_per_index() {
        let mut rng = rand::thread_rng();
        let first = DataObject::random(7, 8, &mut rng);
        let second = DataObject::random(7, 8, &mut rng);
        // Same identity, independently randomized payloads.
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, DataObject::id_for_index(7));
    }

    #[test]
    fn random_object_has_requested_dimensions() {
        let mut rng = rand::thread_rng();
        let obj = DataObject::random(0, 1536, &mut rng);
        assert_eq!(obj.vector.len(), 1536);
        assert!((0..=10_000).contains(&obj.int1));
        assert!((0.0..1.0).contains(&obj.number1));
    }
}
