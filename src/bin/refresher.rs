//! Cropledger Refresher
//!
//! Headless worker: keeps one selection fresh on the configured schedule and
//! logs a summary of every published snapshot. The selection comes from
//! `SERIES_DATASET`, `SERIES_ENTITIES` (comma separated) and `SERIES_PERIOD`.

use cropledger::config::AppConfig;
use cropledger::core::engine::{EngineConfig, SeriesEngine};
use cropledger::core::runtime::{RefreshCoordinator, RuntimeConfig};
use cropledger::core::scheduler::{ChangeNotifier, RefreshScheduler};
use cropledger::logging;
use cropledger::metrics::Metrics;
use cropledger::models::{Dataset, EntityId, Period, SeriesRequest};
use cropledger::services::FarmApiClient;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{info, warn};

fn selection_from_env() -> Result<SeriesRequest, Box<dyn std::error::Error>> {
    let dataset: Dataset = env::var("SERIES_DATASET")
        .unwrap_or_else(|_| "harvests".to_string())
        .parse()?;
    let period: Period = env::var("SERIES_PERIOD")
        .unwrap_or_else(|_| "month".to_string())
        .parse()?;
    let entities = env::var("SERIES_ENTITIES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EntityId>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SeriesRequest::new(dataset, entities, period))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    let config = AppConfig::from_env();
    logging::init_logging(&config);

    let selection = selection_from_env()?;
    info!("Starting Cropledger Refresher");
    info!(environment = %config.environment, "Environment");
    info!(
        dataset = %selection.dataset,
        entities = ?selection.entities,
        period = %selection.period,
        "Selection"
    );

    if selection.entities.is_empty() {
        return Err("SERIES_ENTITIES must name at least one product for the refresher".into());
    }
    if config.refresh_interval_seconds == 0 {
        warn!("REFRESH_INTERVAL_SECONDS is 0; only the initial cycle will run");
    }

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
        RefreshCoordinator::new(engine, RuntimeConfig::from(&config)).with_metrics(metrics),
    );

    let scheduler = RefreshScheduler::new(
        coordinator.clone(),
        ChangeNotifier::new(),
        config.refresh_interval_seconds,
    )
    .map_err(|e| e as Box<dyn std::error::Error>)?;

    coordinator.select(selection).await;
    scheduler
        .start()
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    let reporter = coordinator.clone();
    let report_handle = tokio::spawn(async move {
        let mut last_reported = 0;
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let Some(snapshot) = reporter.latest().await else {
                continue;
            };
            if snapshot.generation == last_reported {
                continue;
            }
            last_reported = snapshot.generation;

            match &snapshot.outcome {
                Ok(series) => info!(
                    generation = snapshot.generation,
                    buckets = series.rows.len(),
                    used_fallback = series.used_fallback,
                    fallback_slices = ?series.fallback_slices,
                    local_slices = ?series.local_slices,
                    partial_errors = ?series.partial_errors,
                    excluded_records = series.excluded_records,
                    "Snapshot {} published with {} buckets",
                    snapshot.generation,
                    series.rows.len()
                ),
                Err(message) => warn!(
                    generation = snapshot.generation,
                    error = %message,
                    "Snapshot {} failed: {}",
                    snapshot.generation,
                    message
                ),
            }
        }
    });

    info!("Refresher started, waiting for shutdown signal...");
    signal::ctrl_c().await?;
    info!("Shutting down refresher...");

    report_handle.abort();
    scheduler.stop().await;
    coordinator.cancel_in_flight().await;
    info!("Refresher stopped");

    Ok(())
}
