//! Refresh triggers: cron-based periodic ticks and data-change notifications

use crate::core::runtime::RefreshCoordinator;
use crate::models::record::EntityId;
use crate::models::request::Dataset;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A record was created, updated or deleted upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataChanged {
    #[serde(default)]
    pub dataset: Option<Dataset>,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
}

/// Fire-and-forget change signal shared between writers and the scheduler.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<DataChanged>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns the number of listeners reached; zero listeners is not an error.
    pub fn notify(&self, event: DataChanged) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataChanged> {
        self.sender.subscribe()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert an interval to a cron expression (second minute hour day month weekday).
///
/// Only intervals that evenly divide their enclosing minute, hour or day keep a
/// fixed gap under cron; anything else returns `None`.
fn cron_expression(interval_seconds: u64) -> Option<String> {
    let divides = |step: u64, whole: u64| step > 0 && step < whole && whole % step == 0;
    let minutes = interval_seconds / 60;
    let hours = interval_seconds / 3600;

    if divides(interval_seconds, 60) {
        Some(format!("*/{} * * * * *", interval_seconds))
    } else if interval_seconds % 60 == 0 && divides(minutes, 60) {
        Some(format!("0 */{} * * * *", minutes))
    } else if interval_seconds % 3600 == 0 && divides(hours, 24) {
        Some(format!("0 0 */{} * * *", hours))
    } else if interval_seconds == 86_400 {
        Some("0 0 0 * * *".to_string())
    } else {
        None
    }
}

/// How periodic refreshes are timed.
#[derive(Clone)]
enum Cadence {
    /// Aligned to the wall clock.
    Cron(Schedule),
    /// Measured from scheduler start, for intervals cron cannot space evenly.
    Fixed(Duration),
}

/// Drives `RefreshCoordinator::refresh` from a periodic tick and from change events.
pub struct RefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    notifier: ChangeNotifier,
    cadence: Option<Cadence>,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl RefreshScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `coordinator` - Coordinator whose selection gets refreshed
    /// * `notifier` - Source of data-change events
    /// * `interval_seconds` - Periodic refresh interval (0 = change events only)
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        notifier: ChangeNotifier,
        interval_seconds: u64,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let cadence = if interval_seconds == 0 {
            info!("RefreshScheduler: periodic refresh disabled, change events only");
            None
        } else if let Some(cron_expr) = cron_expression(interval_seconds) {
            let schedule = Schedule::from_str(&cron_expr).map_err(|e| {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid cron expression '{}': {}", cron_expr, e),
                )) as Box<dyn std::error::Error + Send + Sync>
            })?;
            info!(
                interval = interval_seconds,
                cron = %cron_expr,
                "RefreshScheduler: created with interval {}s (cron: {})",
                interval_seconds,
                cron_expr
            );
            Some(Cadence::Cron(schedule))
        } else {
            info!(
                interval = interval_seconds,
                "RefreshScheduler: created with interval {}s (not cron-aligned, timed from start)",
                interval_seconds
            );
            Some(Cadence::Fixed(Duration::from_secs(interval_seconds)))
        };

        Ok(Self {
            coordinator,
            notifier,
            cadence,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut guard = self.handle.write().await;
        if guard.is_some() {
            return Err("RefreshScheduler already running".into());
        }

        let coordinator = self.coordinator.clone();
        let cadence = self.cadence.clone();
        // Subscribe before spawning so events sent right after start() are seen.
        let mut changes = self.notifier.subscribe();

        let handle = tokio::spawn(async move {
            info!("RefreshScheduler: started");
            let mut listening = true;
            let mut ticker = Ticker::new(cadence);
            let periodic = ticker.is_periodic();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("RefreshScheduler: periodic tick");
                        coordinator.refresh().await;
                    }
                    event = changes.recv(), if listening => match event {
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            let coalesced = 1 + drain_pending(&mut changes);
                            debug!(
                                events = coalesced,
                                "RefreshScheduler: data changed ({} events coalesced)",
                                coalesced
                            );
                            coordinator.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("RefreshScheduler: change channel closed, periodic refresh only");
                            listening = false;
                            if !periodic {
                                break;
                            }
                        }
                    },
                }
            }
            info!("RefreshScheduler: no triggers left, exiting");
        });

        *guard = Some(handle);
        info!("RefreshScheduler: started successfully");
        Ok(())
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!("RefreshScheduler: stopped");
        }
    }

    /// Check if the scheduler is running
    pub async fn is_running(&self) -> bool {
        let handle = self.handle.read().await;
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Consume everything already queued so a burst of changes costs one refresh.
fn drain_pending(changes: &mut broadcast::Receiver<DataChanged>) -> u64 {
    let mut drained = 0;
    loop {
        match changes.try_recv() {
            Ok(_) => drained += 1,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => drained += skipped,
            Err(_) => return drained,
        }
    }
}

enum Ticker {
    Cron(Schedule),
    Fixed(tokio::time::Interval),
    Never,
}

impl Ticker {
    fn new(cadence: Option<Cadence>) -> Self {
        match cadence {
            Some(Cadence::Cron(schedule)) => Ticker::Cron(schedule),
            Some(Cadence::Fixed(period)) => {
                // First tick one period after start, not immediately.
                let start = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                Ticker::Fixed(interval)
            }
            None => Ticker::Never,
        }
    }

    fn is_periodic(&self) -> bool {
        !matches!(self, Ticker::Never)
    }

    /// Sleep until the next periodic refresh; never resolves without a cadence.
    async fn tick(&mut self) {
        match self {
            Ticker::Cron(schedule) => match schedule.upcoming(chrono::Utc).next() {
                Some(next) => {
                    let duration = (next - chrono::Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(duration).await;
                }
                None => tokio::time::sleep(Duration::from_secs(60)).await,
            },
            Ticker::Fixed(interval) => {
                interval.tick().await;
            }
            Ticker::Never => std::future::pending().await,
        }
    }
}
