//! Quillforge Batch Engine - Main Entry Point

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use config::DaemonConfig;
use quillforge_api_rpc::{RpcServer, RpcServerConfig};
use quillforge_core::application::{
    shutdown_channel, ActiveUsers, BatchJobService, Dispatcher, DispatcherConfig, ItemPipeline,
    JobWorker, QuotaAccountant, RecoveryService, WorkerConfig,
};
use quillforge_core::domain::TokenPricing;
use quillforge_core::port::id_provider::UuidProvider;
use quillforge_core::port::time_provider::SystemTimeProvider;
use quillforge_infra_http::{GenerationApiConfig, HttpContentFetcher, HttpGenerationClient};
use quillforge_infra_sqlite::{
    create_pool, run_migrations, SqliteContentRepository, SqliteJobRepository, SqliteQuotaStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = telemetry::init_logging(&config)?;

    info!("Quillforge engine v{} starting...", VERSION);

    // 2. Database
    if config.db_path != ":memory:" {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    info!(db_path = %config.db_path, "Initializing database...");
    let pool = create_pool(&config.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Adapters (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
    let content_repo = Arc::new(SqliteContentRepository::new(pool.clone()));
    let quota_store = Arc::new(SqliteQuotaStore::new(pool.clone()));

    let mut api_config =
        GenerationApiConfig::new(&config.generation_api_url, &config.generation_api_key);
    api_config.default_model = config.default_model.clone();
    let generation_client = Arc::new(
        HttpGenerationClient::new(api_config, TokenPricing::default())
            .context("Generation client setup failed")?,
    );
    let content_fetcher =
        Arc::new(HttpContentFetcher::new().context("Content fetcher setup failed")?);

    // 4. Crash recovery, before anything can claim a job
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(job_repo.clone(), time_provider.clone(), None);
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = %e, "Crash recovery failed"),
    }

    // 5. Application services
    let accountant = Arc::new(QuotaAccountant::new(job_repo.clone(), quota_store.clone()));
    let pipeline = Arc::new(ItemPipeline::new(
        content_repo,
        generation_client,
        content_fetcher,
        accountant.clone(),
        id_provider.clone(),
        time_provider.clone(),
    ));
    let worker = Arc::new(JobWorker::new(
        job_repo.clone(),
        pipeline,
        accountant,
        time_provider.clone(),
        WorkerConfig {
            item_delay: config.item_delay,
        },
    ));
    let job_service = Arc::new(BatchJobService::new(
        job_repo.clone(),
        quota_store,
        id_provider,
        time_provider.clone(),
    ));
    let active_users = ActiveUsers::new();

    // 6. JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        rate_limit: config.rate_limit,
        ..Default::default()
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, job_service, active_users.clone())
        .start()
        .await
        .context("RPC server start failed")?;

    // 7. Dispatcher
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let dispatcher = Arc::new(Dispatcher::new(
        job_repo,
        worker,
        time_provider,
        active_users,
        shutdown_rx,
        DispatcherConfig {
            poll_interval: config.poll_interval,
            batch_limit: config.dispatch_limit,
            drain_timeout: config.shutdown_grace,
        },
    ));
    let dispatcher_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run().await })
    };

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Draining workers...");

    // 9. Graceful shutdown: stop polling, let workers hand back, then close the API
    shutdown_tx.shutdown();
    if let Err(e) = dispatcher_handle.await {
        warn!(error = %e, "Dispatcher task ended abnormally");
    }
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    rpc_handle.stopped().await;
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
