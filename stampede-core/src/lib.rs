//! # Stampede Core
//!
//! Foundational library for the stampede multi-tenant load engine.
//!
//! Stampede drives a sustained, realistic workload against a clustered,
//! tenant-partitioned object/vector store and observes how the store behaves
//! under continuous tenant churn: data import, TTL-driven deactivation, tier
//! migration and concurrent query traffic. This crate provides the pieces the
//! drivers in `stampede-engine` are built from:
//!
//! - [`lifecycle`]: the tenant activity state machine and its legal transitions
//! - [`retry`]: the bounded-retry and convergence-polling primitives that every
//!   cluster-mutating operation is funneled through
//! - [`gateway`]: the backend store interface, with an HTTP client for real
//!   clusters and an in-memory implementation for tests and simulations
//! - [`config`]: environment-driven configuration for every driver
//! - [`telemetry`]: the Prometheus metric set and its HTTP exporter
//! - [`types`]: strongly typed tenant, object and ledger records
//!
//! The engine never implements the store's consistency or replication
//! protocol; it only requests transitions and observes externally visible
//! state. Mutations are idempotent rather than exactly-once: deterministic
//! object identifiers make any retry converge to the same logical result.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod retry;
pub mod telemetry;
pub mod types;

// Core re-exports for convenience
pub use crate::{
    error::{Error, Result},
    gateway::{GatewayError, TenantStore},
    lifecycle::ActivityStatus,
    retry::{poll_until, retry, PollError, RetryError, RetryPolicy},
    telemetry::EngineMetrics,
    types::{DataObject, TenantName, Timestamp, TtlEntry, TtlRecord},
};

/// Common imports for downstream crates.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{GatewayError, MemoryGateway, TenantStore};
    pub use crate::lifecycle::ActivityStatus;
    pub use crate::retry::{poll_until, retry, PollError, RetryError, RetryPolicy};
    pub use crate::telemetry::EngineMetrics;
    pub use crate::types::*;
}
