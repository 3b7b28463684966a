//! Cropledger API Server
//!
//! Serves series over HTTP and keeps the current selection fresh through the
//! refresh scheduler. Data changes are pushed in via `POST /api/data-changed`.

use cropledger::config::AppConfig;
use cropledger::core::engine::{EngineConfig, SeriesEngine};
use cropledger::core::http::{start_server, AppState, HealthStatus};
use cropledger::core::runtime::{RefreshCoordinator, RuntimeConfig};
use cropledger::core::scheduler::{ChangeNotifier, RefreshScheduler};
use cropledger::logging;
use cropledger::metrics::Metrics;
use cropledger::services::FarmApiClient;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    let config = AppConfig::from_env();
    logging::init_logging(&config);

    info!("Starting Cropledger API Server");
    info!(environment = %config.environment, "Environment");
    info!(base_url = %config.api_base_url, "Farm API: {}", config.api_base_url);
    info!(port = config.port, "HTTP Server: http://0.0.0.0:{}", config.port);

    let metrics = Arc::new(Metrics::new()?);
    let client = Arc::new(FarmApiClient::new(config.api_base_url.clone())?);
    let engine = Arc::new(
        SeriesEngine::new(
            client.clone(),
            client,
            EngineConfig {
                fetch_timeout: config.fetch_timeout,
            },
        )
        .with_metrics(metrics.clone()),
    );
    let coordinator = Arc::new(
        RefreshCoordinator::new(engine.clone(), RuntimeConfig::from(&config))
            .with_metrics(metrics.clone()),
    );
    let notifier = ChangeNotifier::new();

    let scheduler = RefreshScheduler::new(
        coordinator.clone(),
        notifier.clone(),
        config.refresh_interval_seconds,
    )
    .map_err(|e| e as Box<dyn std::error::Error>)?;
    scheduler
        .start()
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics,
        start_time: Arc::new(Instant::now()),
        engine,
        coordinator: coordinator.clone(),
        notifier,
    };

    let port = config.port;
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
            server_handle.abort();
        }
        _ = &mut server_handle => {
            error!("HTTP server stopped");
        }
    }

    scheduler.stop().await;
    coordinator.cancel_in_flight().await;
    info!("API server stopped");

    Ok(())
}
