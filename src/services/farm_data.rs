//! Collaborator interfaces the engine fetches from.

use crate::error::SourceError;
use crate::models::aggregate::AggregateRow;
use crate::models::record::{Category, EntityId, RawRecord};
use crate::models::request::{DateRange, Dataset, Period};

/// Raw record listing. No ordering guarantee on the returned records.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    async fn list_records(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

/// Pre-aggregated rows per entity, period and category.
///
/// An empty result can mean a genuinely empty slice or a backend defect; the two
/// are indistinguishable here.
#[async_trait::async_trait]
pub trait AggregateSource: Send + Sync {
    async fn fetch_aggregate(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        period: Period,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<AggregateRow>, SourceError>;

    /// Whether `category_filter` narrows the aggregate for this dataset.
    ///
    /// When false, category slices are built from raw records instead of fetched.
    fn filters_by_category(&self, _dataset: Dataset) -> bool {
        true
    }
}
