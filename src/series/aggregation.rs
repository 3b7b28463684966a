//! Local aggregation of raw records into period buckets

use crate::models::aggregate::{AggregateRow, BucketKey, MetricBasis};
use crate::models::record::{Category, Record};
use crate::models::request::Period;
use crate::series::bucket::bucket_key;
use std::collections::BTreeMap;

/// Groups already-fetched records into per-bucket sums. Never touches the network.
pub struct RawAggregator;

impl RawAggregator {
    /// Aggregate with the yield basis (`Σprimary / Σsecondary`).
    pub fn aggregate(
        records: &[Record],
        period: Period,
        category_filter: Option<&Category>,
    ) -> Vec<AggregateRow> {
        Self::aggregate_with_basis(
            records,
            period,
            category_filter,
            MetricBasis::PrimaryPerSecondary,
        )
    }

    /// Aggregate records matching `category_filter`, sorted ascending by bucket key.
    ///
    /// A missing secondary quantity counts as 0.
    pub fn aggregate_with_basis(
        records: &[Record],
        period: Period,
        category_filter: Option<&Category>,
        basis: MetricBasis,
    ) -> Vec<AggregateRow> {
        let mut buckets: BTreeMap<BucketKey, Vec<(f64, f64)>> = BTreeMap::new();

        for record in records.iter().filter(|r| r.matches(category_filter)) {
            buckets
                .entry(bucket_key(record.date, period))
                .or_default()
                .push((record.quantity, record.secondary_quantity.unwrap_or(0.0)));
        }

        buckets
            .into_iter()
            .map(|(key, mut values)| {
                // Summation order is fixed so the result is identical for any input order.
                values.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                let (sum_primary, sum_secondary) = values
                    .iter()
                    .fold((0.0_f64, 0.0_f64), |(p, s), &(q, sq)| (p + q, s + sq));
                AggregateRow::from_sums(key, sum_primary, sum_secondary, basis)
            })
            .collect()
    }

    /// True if at least one record falls under the filter.
    pub fn has_matching(records: &[Record], category_filter: Option<&Category>) -> bool {
        records.iter().any(|r| r.matches(category_filter))
    }
}
