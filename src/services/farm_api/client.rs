//! REST client for the farm backend

use super::messages::{HarvestAggregateWire, HarvestRecordWire, SaleAggregateWire, SaleRecordWire};
use crate::error::SourceError;
use crate::models::aggregate::AggregateRow;
use crate::models::record::{Category, EntityId, RawRecord};
use crate::models::request::{DateRange, Dataset, Period};
use crate::services::farm_data::{AggregateSource, RecordSource};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

pub struct FarmApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl FarmApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|e| SourceError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn filter_params(
        dataset: Dataset,
        entity_id: EntityId,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![("product", entity_id.to_string())];
        if let Some(from) = date_range.from {
            params.push(("date__gte", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = date_range.to {
            params.push(("date__lte", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(category) = category_filter {
            let field = match dataset {
                Dataset::Harvests => "cultivation_type",
                Dataset::Sales => "market",
            };
            params.push((field, category.as_str().to_string()));
        }
        params
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, params = ?params, "GET {}", url);

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Farm API returned {}", status);
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RecordSource for FarmApiClient {
    async fn list_records(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let params = Self::filter_params(dataset, entity_id, date_range, category_filter);
        let records = match dataset {
            Dataset::Harvests => self
                .get_json::<Vec<HarvestRecordWire>>("/harvests/", &params)
                .await?
                .into_iter()
                .map(|wire| wire.into_raw(entity_id))
                .collect(),
            Dataset::Sales => self
                .get_json::<Vec<SaleRecordWire>>("/sales/", &params)
                .await?
                .into_iter()
                .map(|wire| wire.into_raw(entity_id))
                .collect(),
        };
        Ok(records)
    }
}

#[async_trait::async_trait]
impl AggregateSource for FarmApiClient {
    async fn fetch_aggregate(
        &self,
        dataset: Dataset,
        entity_id: EntityId,
        period: Period,
        date_range: &DateRange,
        category_filter: Option<&Category>,
    ) -> Result<Vec<AggregateRow>, SourceError> {
        let mut params = Self::filter_params(dataset, entity_id, date_range, category_filter);
        params.push(("period", period.as_str().to_string()));

        let rows: Vec<Option<AggregateRow>> = match dataset {
            Dataset::Harvests => self
                .get_json::<Vec<HarvestAggregateWire>>("/harvests/aggregate/", &params)
                .await?
                .into_iter()
                .map(|wire| wire.into_row(period))
                .collect(),
            Dataset::Sales => self
                .get_json::<Vec<SaleAggregateWire>>("/sales/aggregate/", &params)
                .await?
                .into_iter()
                .map(|wire| wire.into_row(period))
                .collect(),
        };

        // Remote keys are period-start dates; they were re-bucketed to canonical keys above.
        let mut rows = rows
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SourceError::Decode("aggregate row with unparseable date".into()))?;
        rows.sort_by(|a, b| a.bucket_key.cmp(&b.bucket_key));
        Ok(rows)
    }

    /// `/sales/aggregate/` ignores `market` and always answers with every market summed.
    fn filters_by_category(&self, dataset: Dataset) -> bool {
        matches!(dataset, Dataset::Harvests)
    }
}
