//! Environment-driven configuration for every driver.
//!
//! Each long-running process reads its own config struct from the
//! environment at startup. Values are typed, defaulted and validated up
//! front: an unparseable or out-of-range value is a configuration error that
//! terminates the process immediately, never retried.

use crate::error::{Error, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::configuration(format!("invalid {key}={raw}: {e}"))),
        Err(_) => Ok(default),
    }
}

fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::configuration(format!("invalid {key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Endpoints for data and control-plane traffic.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Data-plane host (objects, queries, TTL ledger).
    pub host: String,
    /// Data-plane port.
    pub port: u16,
    /// Control-plane host (tenant management, cluster stats, backups).
    pub control_host: String,
    /// Control-plane port.
    pub control_port: u16,
}

impl GatewayConfig {
    /// Read `HOST`/`PORT`/`CONTROL_HOST`/`CONTROL_PORT`. The control-plane
    /// endpoint defaults to the data-plane one.
    pub fn from_env() -> Result<Self> {
        let host: String = env_or("HOST", "localhost".to_string())?;
        let port: u16 = env_or("PORT", 8080)?;
        let control_host = env_or("CONTROL_HOST", host.clone())?;
        let control_port = env_or("CONTROL_PORT", port)?;
        Ok(Self { host, port, control_host, control_port })
    }
}

/// Where the import engine's tenant cursor starts and stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Loop over `[min_tenant_id, max_tenant_id)` forever, wrapping at the top.
    Continuous {
        /// Lowest tenant index, inclusive.
        min_tenant_id: u64,
        /// Highest tenant index, exclusive.
        max_tenant_id: u64,
    },
    /// Stop once this many tenants have been processed.
    Bounded {
        /// Total tenant target.
        total_tenants: u64,
    },
}

/// Configuration for the batch import engine.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Window size: tenants processed per cycle.
    pub tenants_per_cycle: u64,
    /// Objects written per tenant.
    pub objects_per_tenant: u64,
    /// Cursor behavior, see [`ImportMode`].
    pub mode: ImportMode,
    /// Embedding dimensionality.
    pub vector_dimensions: usize,
    /// Probability that a window skips tenant creation, simulating
    /// pre-existing tenants.
    pub implicit_tenant_ratio: f64,
    /// Flip freshly created tenants to `COLD` right after import.
    pub deactivate_tenants: bool,
    /// Lifetime of each tenant's data before the scanner deactivates it.
    pub ttl: Duration,
    /// Maximum objects per batch write.
    pub object_batch_size: usize,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            tenants_per_cycle: 50,
            objects_per_tenant: 1000,
            mode: ImportMode::Continuous { min_tenant_id: 0, max_tenant_id: 10_000 },
            vector_dimensions: 1536,
            implicit_tenant_ratio: 0.0,
            deactivate_tenants: false,
            ttl: Duration::from_secs(90),
            object_batch_size: 1000,
        }
    }
}

impl ImporterConfig {
    /// Read the importer configuration from the environment.
    ///
    /// Setting `TOTAL_TENANTS` selects bounded mode; otherwise the importer
    /// loops over `MIN_TENANT_ID..=MAX_TENANT_ID` continuously.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let mode = match env_opt::<u64>("TOTAL_TENANTS")? {
            Some(total_tenants) => ImportMode::Bounded { total_tenants },
            None => ImportMode::Continuous {
                min_tenant_id: env_or("MIN_TENANT_ID", 0)?,
                max_tenant_id: env_or("MAX_TENANT_ID", 10_000)?,
            },
        };
        let cfg = Self {
            tenants_per_cycle: env_or("TENANTS_PER_CYCLE", defaults.tenants_per_cycle)?,
            objects_per_tenant: env_or("OBJECTS_PER_TENANT", defaults.objects_per_tenant)?,
            mode,
            vector_dimensions: env_or("VECTOR_DIMENSIONS", defaults.vector_dimensions)?,
            implicit_tenant_ratio: env_or("IMPLICIT_TENANT_RATIO", defaults.implicit_tenant_ratio)?,
            deactivate_tenants: env_or("DEACTIVATE_TENANTS", defaults.deactivate_tenants)?,
            ttl: Duration::from_secs(env_or("TTL", 90)?),
            object_batch_size: env_or("OBJECT_BATCH_SIZE", defaults.object_batch_size)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the importer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tenants_per_cycle == 0 {
            return Err(Error::configuration("TENANTS_PER_CYCLE must be positive"));
        }
        if self.objects_per_tenant == 0 {
            return Err(Error::configuration("OBJECTS_PER_TENANT must be positive"));
        }
        if self.vector_dimensions == 0 {
            return Err(Error::configuration("VECTOR_DIMENSIONS must be positive"));
        }
        if !(0.0..=1.0).contains(&self.implicit_tenant_ratio) {
            return Err(Error::configuration("IMPLICIT_TENANT_RATIO must be within [0, 1]"));
        }
        if self.object_batch_size == 0 {
            return Err(Error::configuration("OBJECT_BATCH_SIZE must be positive"));
        }
        if let ImportMode::Continuous { min_tenant_id, max_tenant_id } = self.mode {
            if max_tenant_id <= min_tenant_id {
                return Err(Error::configuration("MAX_TENANT_ID must be greater than MIN_TENANT_ID"));
            }
        }
        Ok(())
    }
}

/// Configuration for the TTL expiry scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Fixed tick interval; cycles longer than this fire the next tick
    /// immediately.
    pub tick_interval: Duration,
    /// Maximum expired records consumed per tick.
    pub batch_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_secs(10), batch_limit: 1000 }
    }
}

impl ScannerConfig {
    /// Read `TICK_INTERVAL` (seconds) and `TTL_BATCH_LIMIT`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            tick_interval: Duration::from_secs(env_or("TICK_INTERVAL", 10)?),
            batch_limit: env_or("TTL_BATCH_LIMIT", defaults.batch_limit)?,
        };
        if cfg.batch_limit == 0 {
            return Err(Error::configuration("TTL_BATCH_LIMIT must be positive"));
        }
        Ok(cfg)
    }
}

/// Configuration for the reactivation sampler.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Cycle pacing interval.
    pub tick_interval: Duration,
    /// Percentage of the total tenant population sampled per cycle.
    pub percentage_of_tenants: u32,
    /// Objects a tenant holds; the rewrite subset is drawn from this range.
    pub objects_per_tenant: u64,
    /// Size of the random object subset rewritten on reactivation.
    pub objects_to_update: u64,
    /// Embedding dimensionality for rewritten objects.
    pub vector_dimensions: usize,
    /// Fresh TTL granted on reactivation.
    pub ttl: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            percentage_of_tenants: 30,
            objects_per_tenant: 1000,
            objects_to_update: 300,
            vector_dimensions: 1536,
            ttl: Duration::from_secs(90),
        }
    }
}

impl SamplerConfig {
    /// Read the sampler configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            tick_interval: Duration::from_secs(env_or("TICK_INTERVAL", 10)?),
            percentage_of_tenants: env_or("PERCENTAGE_OF_TENANTS", defaults.percentage_of_tenants)?,
            objects_per_tenant: env_or("OBJECTS_PER_TENANT", defaults.objects_per_tenant)?,
            objects_to_update: env_or("OBJECTS_TO_UPDATE", defaults.objects_to_update)?,
            vector_dimensions: env_or("VECTOR_DIMENSIONS", defaults.vector_dimensions)?,
            ttl: Duration::from_secs(env_or("TTL", 90)?),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.percentage_of_tenants > 100 {
            return Err(Error::configuration("PERCENTAGE_OF_TENANTS must be within [0, 100]"));
        }
        if self.objects_to_update > self.objects_per_tenant {
            return Err(Error::configuration("OBJECTS_TO_UPDATE must not exceed OBJECTS_PER_TENANT"));
        }
        Ok(())
    }
}

/// Configuration for the offload/onload orchestrator.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Total tenants to move before the orchestrator stops.
    pub total_tenants: u64,
    /// Tenants migrated per batch.
    pub tenants_per_cycle: u64,
    /// Interval between convergence polls.
    pub poll_interval: Duration,
    /// Per-batch convergence timeout; elapsing is a warning, not a failure.
    pub poll_timeout: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            total_tenants: 10_000,
            tenants_per_cycle: 50,
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(600),
        }
    }
}

impl MigrationConfig {
    /// Read `TOTAL_TENANTS` and `TENANTS_PER_CYCLE`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            total_tenants: env_or("TOTAL_TENANTS", defaults.total_tenants)?,
            tenants_per_cycle: env_or("TENANTS_PER_CYCLE", defaults.tenants_per_cycle)?,
            poll_interval: defaults.poll_interval,
            poll_timeout: Duration::from_secs(env_or("CONVERGENCE_TIMEOUT", 600)?),
        };
        if cfg.tenants_per_cycle == 0 {
            return Err(Error::configuration("TENANTS_PER_CYCLE must be positive"));
        }
        Ok(cfg)
    }
}

/// Configuration for the query load generator.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Number of tenants sampled (with replacement) for querying.
    pub tenants: usize,
    /// Concurrent workers per sampled tenant.
    pub parallel_queries_per_tenant: usize,
    /// Queries each worker issues before finishing.
    pub queries_per_tenant: u64,
    /// Target per-worker query rate.
    pub queries_per_minute: u32,
    /// Tenants below this object count are skipped as too fresh to query.
    pub min_object_count: u64,
    /// Dimensionality of the random query vectors.
    pub vector_dimensions: usize,
    /// Replication factor; above 1 queries request relaxed consistency.
    pub replication_factor: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tenants: 10,
            parallel_queries_per_tenant: 3,
            queries_per_tenant: 1000,
            queries_per_minute: 30,
            min_object_count: 100,
            vector_dimensions: 1536,
            replication_factor: 1,
        }
    }
}

impl QueryConfig {
    /// Read the query generator configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            tenants: env_or("TENANTS", defaults.tenants)?,
            parallel_queries_per_tenant: env_or(
                "PARALLEL_QUERIES_PER_TENANT",
                defaults.parallel_queries_per_tenant,
            )?,
            queries_per_tenant: env_or("QUERIES_PER_TENANT", defaults.queries_per_tenant)?,
            queries_per_minute: env_or("QUERY_FREQUENCY_PER_MINUTE", defaults.queries_per_minute)?,
            min_object_count: env_or("MIN_OBJECT_COUNT", defaults.min_object_count)?,
            vector_dimensions: env_or("VECTOR_DIMENSIONS", defaults.vector_dimensions)?,
            replication_factor: env_or("REPLICATION_FACTOR", defaults.replication_factor)?,
        };
        if cfg.queries_per_minute == 0 {
            return Err(Error::configuration("QUERY_FREQUENCY_PER_MINUTE must be positive"));
        }
        Ok(cfg)
    }
}

/// Telemetry exporter configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Port the `/metrics` endpoint listens on.
    pub prometheus_port: u16,
}

impl TelemetryConfig {
    /// Read `PROMETHEUS_PORT`, defaulting to 8000.
    pub fn from_env() -> Result<Self> {
        Ok(Self { prometheus_port: env_or("PROMETHEUS_PORT", 8000)? })
    }
}
