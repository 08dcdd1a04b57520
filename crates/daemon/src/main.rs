//! Queue Server - Main Entry Point
//! Persistent job queue daemon: JSON-RPC admin surface + polling consumer

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

// Import workspace crates
use queueserver_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use queueserver_core::application::{
    shutdown_channel, Dispatcher, JobService, MaintenanceScheduler, RecoveryService,
    WorkerRegistry,
};
use queueserver_core::port::time_provider::SystemTimeProvider;
use queueserver_core::port::{Maintenance, MaintenanceConfig, TimeProvider};
use queueserver_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository, SqliteMaintenance};
use queueserver_infra_system::register_builtin_workers;

use config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CONSUMER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env().context("Invalid configuration")?;

    // 2. Initialize logging
    telemetry::init(config.log_format)?;
    info!("Queue Server v{} starting...", VERSION);

    // 3. Initialize database
    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");
    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo = Arc::new(SqliteJobRepository::with_order(
        pool.clone(),
        time_provider.clone(),
        config.dequeue_order,
    ));
    let jobs = Arc::new(JobService::new(job_repo, time_provider.clone()));

    let registry = Arc::new(WorkerRegistry::new());
    register_builtin_workers(&registry, time_provider.clone());

    let dispatcher = Arc::new(
        Dispatcher::new(jobs.clone(), registry.clone()).with_poll_interval(config.poll_interval),
    );

    // 5. Jobs left RUNNING by a previous process can never finish
    match RecoveryService::new(jobs.clone()).recover_interrupted_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Maintenance (shared by the RPC surface and the background scheduler)
    let maintenance: Arc<dyn Maintenance> =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));
    let maintenance_config = MaintenanceConfig {
        retention_days: config.retention_days,
        ..Default::default()
    };

    // 7. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let handler = RpcHandler::new(
        jobs.clone(),
        dispatcher.clone(),
        registry.clone(),
        maintenance.clone(),
        MaintenanceScheduler::new(
            maintenance.clone(),
            maintenance_config.clone(),
            config.cleanup_interval_hours,
        ),
    );
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        ..Default::default()
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, handler)
        .start()
        .await
        .context("RPC server start failed")?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 8. Start consumer (job processing loop)
    let consumer_handle = if config.consumer_enabled {
        info!(order = ?config.dequeue_order, "Starting consumer...");
        let dispatcher = dispatcher.clone();
        let token = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = dispatcher.run(token).await {
                error!(error = ?e, "Consumer failed");
            }
        }))
    } else {
        info!("Consumer disabled; jobs run only via queue.execute_next.v1 / queue.drain.v1");
        None
    };

    // 9. Start retention scheduler
    info!("Starting maintenance scheduler...");
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance,
        maintenance_config,
        config.cleanup_interval_hours,
    );
    let maintenance_handle = tokio::spawn(maintenance_scheduler.run(shutdown_rx));

    info!(rpc_addr = %rpc_addr, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 10. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 11. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if let Some(handle) = consumer_handle {
        if tokio::time::timeout(CONSUMER_STOP_TIMEOUT, handle).await.is_err() {
            error!("Consumer did not stop in time; the running job will be recovered on restart");
        }
    }
    let _ = maintenance_handle.await;
    pool.close().await;
    telemetry::shutdown();

    info!("Shutdown complete.");

    Ok(())
}
