//! Enrich Daemon - Main Entry Point
//! JSON-RPC server + enrichment pipeline (+ optional periodic trigger)

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

// Import workspace crates
use crate::settings::DaemonConfig;
use enrich_api_rpc::{RpcServer, RpcServerConfig};
use enrich_core::application::pipeline::AlertBus;
use enrich_core::application::{shutdown_channel, PipelineOrchestrator, PipelineScheduler};
use enrich_core::port::id_provider::UuidProvider;
use enrich_core::port::time_provider::SystemTimeProvider;
use enrich_core::port::TracingAlertSink;
use enrich_infra_http::{HttpEngineConfig, HttpEnrichmentEngine};
use enrich_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = telemetry::init_logging().context("Failed to initialize logging")?;

    info!("Enrich daemon v{} starting...", VERSION);

    // 2. Load configuration
    let cfg = DaemonConfig::from_env()?;
    let pipeline_config = cfg.pipeline_config();

    // 3. Initialize database
    info!(db_path = %cfg.db_path, "Initializing database...");
    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        if !cfg.db_path.starts_with("sqlite:") && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let pool = create_pool(&cfg.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteJobStore::new(pool, time_provider.clone()));

    let mut engine_config = HttpEngineConfig::new(cfg.engine_base_url.clone());
    engine_config.request_timeout = pipeline_config.engine_timeout;
    let engine = Arc::new(
        HttpEnrichmentEngine::new(engine_config).context("Engine client setup failed")?,
    );

    let alerts = Arc::new(AlertBus::default().with_sink(Arc::new(TracingAlertSink)));

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        store,
        engine,
        alerts.clone(),
        time_provider,
        Arc::new(UuidProvider),
        pipeline_config,
    )?);

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        host: cfg.rpc_host.clone(),
        port: cfg.rpc_port,
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, orchestrator.clone(), alerts)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 6. Optional run on start and periodic trigger
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    if cfg.run_on_start {
        match orchestrator.spawn() {
            Ok(_) => info!("Initial pipeline run started"),
            Err(e) => error!(error = %e, "Initial pipeline run failed to start"),
        }
    }

    let scheduler_handle = cfg.run_interval().map(|interval| {
        let scheduler = PipelineScheduler::new(orchestrator.clone(), interval);
        tokio::spawn(scheduler.run(shutdown_rx))
    });

    info!(rpc_addr = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }
    if orchestrator.is_running() {
        info!("A pipeline run was in progress; it stops with the process");
    }

    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}
