//! FarmDispatch Worker - Main Entry Point
//!
//! Serves the `OpenSession` scheduling endpoint of a render server and
//! periodically expires idle sessions.

use anyhow::Context;
use farmdispatch_common::config::WorkerConfig;
use farmdispatch_common::{DispatchError, FarmDispatchConfig, METRICS};
use farmdispatch_worker::{SessionTable, WorkerServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmdispatch_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FarmDispatch Worker");

    // Load configuration
    let config_path = std::env::var("FARMDISPATCH_CONFIG")
        .unwrap_or_else(|_| "configs/worker-config.yaml".to_string());

    let config = FarmDispatchConfig::load_or_env(&config_path, "worker")
        .with_context(|| format!("loading worker configuration ({})", config_path))?;

    info!(
        "Worker configuration loaded: mode={}, bind={}",
        config.mode,
        config.listen_address()
    );

    let worker_config = config.worker.clone()
        .ok_or_else(|| DispatchError::config("Worker config not found"))?;

    let sessions = Arc::new(SessionTable::from_config(&worker_config));
    let reaper_handle = tokio::spawn(run_reaper(sessions.clone(), worker_config));

    let server = WorkerServer::new(sessions);
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
    };

    server.serve(&config.listen_address(), shutdown).await?;
    reaper_handle.abort();

    if config.observability.as_ref().map_or(true, |o| o.enable_metrics) {
        info!("Final metrics:\n{}", METRICS.gather()?);
    }

    info!("FarmDispatch Worker shutdown complete");
    Ok(())
}

/// Periodically drop sessions that have gone idle
async fn run_reaper(sessions: Arc<SessionTable>, worker_config: WorkerConfig) {
    let ttl = Duration::from_secs(worker_config.session_ttl_secs);
    let mut interval = tokio::time::interval(Duration::from_secs(worker_config.reap_interval_secs.max(1)));

    loop {
        interval.tick().await;
        sessions.reap_expired(ttl);
    }
}
