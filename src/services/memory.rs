//! In-memory farm data source for tests and local runs

use crate::error::SourceError;
use crate::models::aggregate::AggregateRow;
use crate::models::record::{parse_iso_date, validate_records, Category, EntityId, RawRecord};
use crate::models::request::{DateRange, Dataset, Period};
use crate::services::farm_data::{AggregateSource, RecordSource};
use crate::series::aggregation::RawAggregator;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Serves fixture records and derives remote-style aggregates from them.
///
/// Harvest aggregates are ratio-only (no `sum_secondary`), matching the real
/// endpoint; sale aggregates carry their sums.
#[derive(Default)]
pub struct InMemorySource {
    records: HashMap<Dataset, Vec<RawRecord>>,
    failing: HashSet<EntityId>,
    blank_slices: HashSet<Option<Category>>,
    latency: HashMap<EntityId, Duration>,
    unfiltered: HashSet<Dataset>,
    failing_slices: HashSet<Category>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, dataset: Dataset, records: Vec<RawRecord>) -> Self {
        self.records.entry(dataset).or_default().extend(records);
        self
    }

    /// Every fetch for this entity fails.
    pub fn failing_entity(mut self, entity_id: EntityId) -> Self {
        self.failing.insert(entity_id);
        self
    }

    /// Aggregates for this category slice come back empty (`None` is the all-categories slice).
    pub fn blank_aggregates_for(mut self, category: Option<Category>) -> Self {
        self.blank_slices.insert(category);
        self
    }

    /// Every fetch for this entity waits before answering.
    pub fn with_latency(mut self, entity_id: EntityId, latency: Duration) -> Self {
        self.latency.insert(entity_id, latency);
        self
    }

    /// Aggregates for this dataset ignore the category filter, like the sales endpoint.
    pub fn ignoring_category_filter(mut self, dataset: Dataset) -> Self {
        self.unfiltered.insert(dataset);
        self
    }

    /// Aggregate fetches for this category slice fail.
    pub fn failing_slice(mut self, category: Category) -> Self {
        self.failing_slices.insert(category);
        self
    }

    async fn admit(&self, entity_id: EntityId) -> Result<(), SourceError> {
        if let Some(latency) = self.latency.get(&entity_id) {
            tokio::time::sleep(*latency).await;
        }
        if self.failing.contains(&entity_id) {
            return Err(SourceError::Unavailable(format!(
                "entity {} is unavailable",
                entity_id
            )));
        }
        Ok(())
    }

    fn matching(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Vec<RawRecord> {
        self.records
            .get(&dataset)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.entity_id == entity_id)
                    .filter(|r| {
                        // Unparseable dates are passed through so validation can count them.
                        match r.date.as_deref().and_then(parse_iso_date) {
                            Some(date) => date_range.contains(date),
                            None => true,
                        }
                    })
                    .filter(|r| match category_filter {
                        Some(category) => r.category.as_deref() == Some(category.as_str()),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RecordSource for InMemorySource {
    async fn list_records(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        self.admit(entity_id).await?;
        Ok(self.matching(dataset, entity_id, date_range, category_filter))
    }
}

#[async_trait::async_trait]
impl AggregateSource for InMemorySource {
    async fn fetch_aggregate(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        period: Period,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<AggregateRow>, SourceError> {
        self.admit(entity_id).await?;
        if let Some(category) = category_filter.filter(|c| self.failing_slices.contains(*c)) {
            return Err(SourceError::Unavailable(format!(
                "aggregate for {} is unavailable",
                category
            )));
        }
        if self.blank_slices.contains(&category_filter.cloned()) {
            return Ok(Vec::new());
        }
        let category_filter = category_filter.filter(|_| self.filters_by_category(dataset));

        let raw = self.matching(dataset, entity_id, date_range, category_filter);
        let records = validate_records(raw).records;
        let mut rows = RawAggregator::aggregate_with_basis(
            &records,
            period,
            category_filter,
            dataset.metric_basis(),
        );
        if dataset == Dataset::Harvests {
            for row in &mut rows {
                row.sum_secondary = None;
            }
        }
        Ok(rows)
    }

    fn filters_by_category(&self, dataset: Dataset) -> bool {
        !self.unfiltered.contains(&dataset)
    }
}
