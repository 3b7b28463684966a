//! Series engine: fan-out fetch, merge, reconcile, stack

use crate::error::{EngineError, SourceError};
use crate::metrics::Metrics;
use crate::models::aggregate::{AggregateRow, SeriesResponse};
use crate::models::record::{validate_records, Category, EntityId, RawRecord};
use crate::models::request::SeriesRequest;
use crate::services::farm_data::{AggregateSource, RecordSource};
use crate::series::merge::merge_with_basis;
use crate::series::aggregation::RawAggregator;
use crate::series::reconcile::reconcile_with_basis;
use crate::series::stack::stack;
use futures_util::future::{join_all, try_join_all};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on every single collaborator call.
    pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(crate::config::DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

/// One aggregate slice per entity: all categories, or a single one.
#[derive(Debug, Clone, PartialEq)]
enum Slice {
    All(Option<Category>),
    Category(Category),
}

/// Where a slice's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Fetched per entity, merged, then reconciled.
    Remote,
    /// The source ignores the category filter; built from raw records.
    Local,
    /// Hidden by the active filter; stacked as zeros, never fetched.
    Suppressed,
}

impl Slice {
    fn for_request(request: &SeriesRequest) -> Vec<Slice> {
        std::iter::once(Slice::All(request.category_filter.clone()))
            .chain(
                request
                    .dataset
                    .tracked_categories()
                    .into_iter()
                    .map(Slice::Category),
            )
            .collect()
    }

    fn origin(&self, request: &SeriesRequest, filters_remotely: bool) -> Origin {
        if let Slice::Category(category) = self {
            if request.category_filter.as_ref().is_some_and(|f| f != category) {
                return Origin::Suppressed;
            }
        }
        if self.filter().is_some() && !filters_remotely {
            Origin::Local
        } else {
            Origin::Remote
        }
    }

    fn filter(&self) -> Option<&Category> {
        match self {
            Slice::All(filter) => filter.as_ref(),
            Slice::Category(category) => Some(category),
        }
    }

    fn label(&self) -> String {
        match self {
            Slice::All(_) => "all".to_string(),
            Slice::Category(category) => category.to_string(),
        }
    }
}

/// Everything fetched for one entity; `aggregates` is index-aligned with the remote slices.
struct EntityFetch {
    records: Vec<RawRecord>,
    aggregates: Vec<Vec<AggregateRow>>,
}

pub struct SeriesEngine {
    records: Arc<dyn RecordSource>,
    aggregates: Arc<dyn AggregateSource>,
    config: EngineConfig,
    metrics: Option<Arc<Metrics>>,
}

impl SeriesEngine {
    pub fn new(
        records: Arc<dyn RecordSource>,
        aggregates: Arc<dyn AggregateSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            records,
            aggregates,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the stacked series for a selection.
    ///
    /// Fetches run concurrently, one record listing plus one aggregate per remote
    /// slice for every entity. Slices hidden by the category filter are not fetched,
    /// and slices the source cannot narrow by category are built from the records.
    /// An entity with any failed fetch is excluded and reported in
    /// `partial_errors`; only a selection where every entity fails is an error.
    /// Cancellation at any point discards the cycle.
    pub async fn get_series(
        &self,
        request: &SeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<SeriesResponse, EngineError> {
        if !request.date_range.is_valid() {
            return Err(EngineError::InvalidRequest(
                "date range starts after it ends".to_string(),
            ));
        }

        let entities = request.distinct_entities();
        if entities.is_empty() {
            return Ok(SeriesResponse::default());
        }

        let start = Instant::now();
        let filters_remotely = self.aggregates.filters_by_category(request.dataset);
        let plan: Vec<(Slice, Origin)> = Slice::for_request(request)
            .into_iter()
            .map(|slice| {
                let origin = slice.origin(request, filters_remotely);
                (slice, origin)
            })
            .collect();
        let remote: Vec<&Slice> = plan
            .iter()
            .filter(|(_, origin)| *origin == Origin::Remote)
            .map(|(slice, _)| slice)
            .collect();

        let remote_list = &remote;
        let fetches = entities.iter().map(|&entity_id| async move {
            (
                entity_id,
                self.fetch_entity(request, entity_id, remote_list).await,
            )
        });

        let results = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            results = join_all(fetches) => results,
        };
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut resolved = Vec::new();
        let mut partial_errors = Vec::new();
        for (entity_id, result) in results {
            match result {
                Ok(fetch) => resolved.push(fetch),
                Err(e) => {
                    warn!(
                        entity_id = entity_id,
                        dataset = %request.dataset,
                        error = %e,
                        "Excluding entity {} from series: {}",
                        entity_id,
                        e
                    );
                    partial_errors.push(entity_id);
                }
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics
                .partial_entity_errors_total
                .inc_by(partial_errors.len() as u64);
        }

        if resolved.is_empty() {
            return Err(EngineError::NoEntitiesResolved {
                failed: partial_errors,
            });
        }

        let mut raw = Vec::new();
        let mut per_slice: Vec<Vec<Vec<AggregateRow>>> = vec![Vec::new(); remote.len()];
        for fetch in resolved {
            raw.extend(fetch.records);
            for (index, rows) in fetch.aggregates.into_iter().enumerate() {
                per_slice[index].push(rows);
            }
        }

        let validated = validate_records(raw);
        if let Some(ref metrics) = self.metrics {
            metrics
                .malformed_records_total
                .inc_by(validated.excluded as u64);
        }

        let basis = request.dataset.metric_basis();
        let mut totals = Vec::new();
        let mut by_category = BTreeMap::new();
        let mut fallback_slices = Vec::new();
        let mut local_slices = Vec::new();
        let mut remote_rows = per_slice.into_iter();

        for (slice, origin) in &plan {
            let rows = match origin {
                Origin::Remote => {
                    let series_list = remote_rows.next().unwrap_or_default();
                    let merged = merge_with_basis(&series_list, basis);
                    let reconciled = reconcile_with_basis(
                        merged,
                        &validated.records,
                        request.period,
                        slice.filter(),
                        basis,
                    );
                    if reconciled.used_fallback {
                        debug!(slice = %slice.label(), "Remote slice empty, using local aggregate");
                        fallback_slices.push(slice.label());
                    }
                    reconciled.rows
                }
                Origin::Local => {
                    local_slices.push(slice.label());
                    RawAggregator::aggregate_with_basis(
                        &validated.records,
                        request.period,
                        slice.filter(),
                        basis,
                    )
                }
                Origin::Suppressed => Vec::new(),
            };
            match slice {
                Slice::All(_) => totals = rows,
                Slice::Category(category) => {
                    by_category.insert(category.clone(), rows);
                }
            }
        }
        let used_fallback = !fallback_slices.is_empty() || !local_slices.is_empty();

        if let Some(ref metrics) = self.metrics {
            metrics
                .fallback_slices_total
                .inc_by(fallback_slices.len() as u64);
            metrics
                .cycle_duration_seconds
                .observe(start.elapsed().as_secs_f64());
        }

        let rows = stack(&by_category, request.category_filter.as_ref());

        info!(
            dataset = %request.dataset,
            period = %request.period,
            entities = entities.len(),
            buckets = rows.len(),
            used_fallback = used_fallback,
            local_slices = local_slices.len(),
            partial_errors = partial_errors.len(),
            excluded_records = validated.excluded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Series built: {} buckets from {} entities",
            rows.len(),
            entities.len()
        );

        Ok(SeriesResponse {
            rows,
            totals,
            used_fallback,
            fallback_slices,
            local_slices,
            partial_errors,
            excluded_records: validated.excluded,
        })
    }

    async fn fetch_entity(
        &self,
        request: &SeriesRequest,
        entity_id: EntityId,
        slices: &[&Slice],
    ) -> Result<EntityFetch, SourceError> {
        let records = self.bounded(self.records.list_records(
            request.dataset,
            entity_id,
            &request.date_range,
            request.category_filter.as_ref(),
        ));

        let aggregates = try_join_all(slices.iter().map(|slice| {
            self.bounded(self.aggregates.fetch_aggregate(
                request.dataset,
                entity_id,
                request.period,
                &request.date_range,
                slice.filter(),
            ))
        }));

        let (records, aggregates) = tokio::try_join!(records, aggregates)?;
        Ok(EntityFetch {
            records,
            aggregates,
        })
    }

    async fn bounded<T>(
        &self,
        fetch: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                timeout_ms: self.config.fetch_timeout.as_millis() as u64,
            }),
        }
    }
}
