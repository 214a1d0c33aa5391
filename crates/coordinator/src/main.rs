//! FarmDispatch Coordinator - Main Entry Point
//!
//! Loads the render server pool and serves the `Assignor` service until
//! the process is terminated.

use anyhow::Context;
use farmdispatch_common::{DispatchError, FarmDispatchConfig, METRICS};
use farmdispatch_coordinator::{CoordinatorServer, DispatchService, GrpcForwarder, ServerPool};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmdispatch_coordinator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FarmDispatch Coordinator");

    // Load configuration
    let config_path = std::env::var("FARMDISPATCH_CONFIG")
        .unwrap_or_else(|_| "configs/coordinator-config.yaml".to_string());

    let config = FarmDispatchConfig::load_or_env(&config_path, "coordinator")
        .with_context(|| format!("loading coordinator configuration ({})", config_path))?;

    info!(
        "Coordinator configuration loaded: mode={}, bind={}",
        config.mode,
        config.listen_address()
    );

    let coordinator_config = config.coordinator.as_ref()
        .ok_or_else(|| DispatchError::config("Coordinator config not found"))?;

    // The process must not serve with a partial pool
    let pool = ServerPool::load(&coordinator_config.pool_path)
        .context("loading render server pool")?;

    let service = DispatchService::new(
        Arc::new(pool),
        GrpcForwarder::from_config(&config)?,
        config.forward_timeout()?,
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
    };

    CoordinatorServer::new(service)
        .serve(&config.listen_address(), shutdown)
        .await?;

    if config.observability.as_ref().map_or(true, |o| o.enable_metrics) {
        info!("Final metrics:\n{}", METRICS.gather()?);
    }

    info!("FarmDispatch Coordinator shutdown complete");
    Ok(())
}
