//! Refresh cycles over the current selection, with supersession

use crate::core::engine::SeriesEngine;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::models::aggregate::SeriesResponse;
use crate::models::request::SeriesRequest;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the refresh runtime
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub refresh_interval_seconds: u64,
    /// Consecutive fallback cycles per slice before a warning is logged.
    pub fallback_warn_after: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: crate::config::DEFAULT_REFRESH_INTERVAL_SECONDS,
            fallback_warn_after: crate::config::DEFAULT_FALLBACK_WARN_AFTER,
        }
    }
}

impl From<&crate::config::AppConfig> for RuntimeConfig {
    fn from(config: &crate::config::AppConfig) -> Self {
        Self {
            refresh_interval_seconds: config.refresh_interval_seconds,
            fallback_warn_after: config.fallback_warn_after,
        }
    }
}

/// Result of one completed, non-superseded cycle.
#[derive(Debug, Clone)]
pub struct CycleSnapshot {
    pub generation: u64,
    pub request: SeriesRequest,
    pub outcome: Result<SeriesResponse, String>,
    pub completed_at: DateTime<Utc>,
}

/// Counts consecutive fallback cycles per slice.
///
/// A slice that keeps coming back empty remotely while local records exist is
/// either a lagging backend or a broken one; after `warn_after` cycles in a row
/// it is logged once. It never blocks a cycle.
#[derive(Debug)]
pub struct FallbackTracker {
    streaks: HashMap<String, u32>,
    warn_after: u32,
}

impl FallbackTracker {
    pub fn new(warn_after: u32) -> Self {
        Self {
            streaks: HashMap::new(),
            warn_after,
        }
    }

    /// Record one cycle's fallback slices. Returns the slices that just reached the threshold.
    pub fn observe(&mut self, fallback_slices: &[String]) -> Vec<String> {
        self.streaks
            .retain(|slice, _| fallback_slices.iter().any(|s| s == slice));

        let mut crossed = Vec::new();
        for slice in fallback_slices {
            let streak = self.streaks.entry(slice.clone()).or_insert(0);
            *streak += 1;
            if self.warn_after > 0 && *streak == self.warn_after {
                warn!(
                    slice = %slice,
                    consecutive_cycles = *streak,
                    "Remote aggregate for slice '{}' empty for {} consecutive cycles while local records exist",
                    slice,
                    streak
                );
                crossed.push(slice.clone());
            }
        }
        crossed
    }

    pub fn streak(&self, slice: &str) -> u32 {
        self.streaks.get(slice).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.streaks.clear();
    }
}

/// A cycle that has been started: the generation it was assigned and its task.
#[derive(Debug)]
pub struct StartedCycle {
    pub generation: u64,
    pub task: JoinHandle<()>,
}

struct CycleState {
    selection: Option<SeriesRequest>,
    generation: u64,
    token: CancellationToken,
}

/// Owns the selection and runs refresh cycles against the engine.
///
/// Starting a cycle cancels the one in flight. A cycle publishes its snapshot
/// only if no newer cycle has started since; anything else is discarded.
pub struct RefreshCoordinator {
    engine: Arc<SeriesEngine>,
    cycle: Mutex<CycleState>,
    latest: RwLock<Option<Arc<CycleSnapshot>>>,
    fallback: Mutex<FallbackTracker>,
    metrics: Option<Arc<Metrics>>,
}

impl RefreshCoordinator {
    pub fn new(engine: Arc<SeriesEngine>, config: RuntimeConfig) -> Self {
        Self {
            engine,
            cycle: Mutex::new(CycleState {
                selection: None,
                generation: 0,
                token: CancellationToken::new(),
            }),
            latest: RwLock::new(None),
            fallback: Mutex::new(FallbackTracker::new(config.fallback_warn_after)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the selection and start a cycle for it.
    pub async fn select(self: &Arc<Self>, request: SeriesRequest) -> StartedCycle {
        let (generation, token) = {
            let mut cycle = self.cycle.lock().await;
            cycle.selection = Some(request.clone());
            Self::advance(&mut cycle)
        };
        self.fallback.lock().await.reset();

        info!(
            generation = generation,
            dataset = %request.dataset,
            entities = ?request.entities,
            period = %request.period,
            "Selection changed, starting cycle {}",
            generation
        );
        self.spawn_cycle(generation, request, token)
    }

    /// Start a cycle for the current selection. `None` when nothing is selected yet.
    pub async fn refresh(self: &Arc<Self>) -> Option<StartedCycle> {
        let (generation, token, request) = {
            let mut cycle = self.cycle.lock().await;
            let request = cycle.selection.clone()?;
            let (generation, token) = Self::advance(&mut cycle);
            (generation, token, request)
        };

        debug!(generation = generation, "Refresh triggered, starting cycle {}", generation);
        Some(self.spawn_cycle(generation, request, token))
    }

    /// Latest published snapshot.
    pub async fn latest(&self) -> Option<Arc<CycleSnapshot>> {
        self.latest.read().await.clone()
    }

    pub async fn selection(&self) -> Option<SeriesRequest> {
        self.cycle.lock().await.selection.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.cycle.lock().await.generation
    }

    /// Cancel whatever cycle is running. Used on shutdown.
    pub async fn cancel_in_flight(&self) {
        self.cycle.lock().await.token.cancel();
    }

    fn advance(cycle: &mut CycleState) -> (u64, CancellationToken) {
        cycle.token.cancel();
        cycle.generation += 1;
        cycle.token = CancellationToken::new();
        (cycle.generation, cycle.token.clone())
    }

    fn spawn_cycle(
        self: &Arc<Self>,
        generation: u64,
        request: SeriesRequest,
        token: CancellationToken,
    ) -> StartedCycle {
        if let Some(ref metrics) = self.metrics {
            metrics.refresh_cycles_total.inc();
        }
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            coordinator.run_cycle(generation, request, token).await;
        });
        StartedCycle { generation, task }
    }

    async fn run_cycle(&self, generation: u64, request: SeriesRequest, token: CancellationToken) {
        let outcome = match self.engine.get_series(&request, &token).await {
            Ok(response) => Ok(response),
            Err(EngineError::Cancelled) => {
                self.discard(generation);
                return;
            }
            Err(e) => {
                warn!(generation = generation, error = %e, "Cycle {} failed: {}", generation, e);
                Err(e.to_string())
            }
        };

        let mut latest = self.latest.write().await;
        {
            let cycle = self.cycle.lock().await;
            if cycle.generation != generation || token.is_cancelled() {
                drop(cycle);
                self.discard(generation);
                return;
            }
        }

        if let Ok(ref response) = outcome {
            self.fallback
                .lock()
                .await
                .observe(&response.fallback_slices);
        }

        *latest = Some(Arc::new(CycleSnapshot {
            generation,
            request,
            outcome,
            completed_at: Utc::now(),
        }));
        debug!(generation = generation, "Cycle {} published", generation);
    }

    fn discard(&self, generation: u64) {
        debug!(generation = generation, "Cycle {} superseded, discarding", generation);
        if let Some(ref metrics) = self.metrics {
            metrics.refresh_cycles_superseded_total.inc();
        }
    }
}
