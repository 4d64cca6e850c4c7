//! Backup/restore process: drives one backup (or restore) to completion.

use anyhow::Result;
use stampede_core::config::GatewayConfig;
use stampede_core::gateway::HttpGateway;
use stampede_core::TenantStore;
use stampede_engine::{init_tracing, BackupDriver};
use std::env;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let gateway_cfg = GatewayConfig::from_env()?;
    let backup_id = env::var("BACKUP_ID").unwrap_or_else(|_| "stampede".to_string());
    let restore = env::var("RESTORE").map(|v| v == "true").unwrap_or(false);

    let store: Arc<dyn TenantStore> = Arc::new(HttpGateway::new(&gateway_cfg)?);
    let driver = BackupDriver::new(store);

    let status = if restore {
        driver.run_restore(&backup_id).await?
    } else {
        driver.run_backup(&backup_id).await?
    };
    info!(id = %backup_id, ?status, "backup driver finished");
    Ok(())
}
