//! # Stampede Engine
//!
//! The long-running drivers of the stampede load test. Each module is an
//! independently scheduled process in the intended deployment; they share a
//! cluster, not a process:
//!
//! - [`importer`]: creates tenants and imports deterministic object batches
//! - [`scanner`]: deactivates tenants whose TTL records have expired
//! - [`sampler`]: reactivates a random share of frozen tenants each cycle
//! - [`migrate`]: moves tenants between the serving and offloaded tiers
//! - [`query`]: sustains concurrent similarity-query traffic
//! - [`backup`]: drives backup/restore operations to completion
//!
//! All drivers are built from the same pieces: the [`stampede_core`] gateway
//! for backend access, the retry/convergence primitives for tolerating an
//! eventually-consistent cluster, and the shared Prometheus metric set.
//!
//! None of the loops accept in-band cancellation; they stop when their target
//! is met (bounded modes) or when the process is terminated.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod importer;
pub mod migrate;
pub mod query;
pub mod sampler;
pub mod scanner;

pub use backup::BackupDriver;
pub use importer::BatchImporter;
pub use migrate::{Direction, TierMigrator};
pub use query::QueryLoadGenerator;
pub use sampler::ReactivationSampler;
pub use scanner::ExpiryScanner;

/// Initialize process-wide tracing from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
