//! Multi-entity merge of aggregate series

use crate::models::aggregate::{AggregateRow, BucketKey, MetricBasis};
use std::collections::BTreeMap;

#[derive(Default)]
struct BucketSums {
    primary: f64,
    secondary: f64,
    exact: bool,
}

/// Merge per-entity series with the yield basis.
pub fn merge(series_list: &[Vec<AggregateRow>]) -> Vec<AggregateRow> {
    merge_with_basis(series_list, MetricBasis::PrimaryPerSecondary)
}

/// Combine one series per entity into a single series keyed by bucket.
///
/// The merged metric is recomputed from merged sums, never averaged across entities.
/// When a row carries no raw secondary sum it is rebuilt from the ratio
/// (`sum_primary / derived_metric` for yields). That is lossy if the producer
/// rounded the ratio; rows with `sum_secondary` set merge exactly.
pub fn merge_with_basis(series_list: &[Vec<AggregateRow>], basis: MetricBasis) -> Vec<AggregateRow> {
    if let [single] = series_list {
        let mut passthrough = single.clone();
        passthrough.sort_by(|a, b| a.bucket_key.cmp(&b.bucket_key));
        return passthrough;
    }

    let mut buckets: BTreeMap<BucketKey, BucketSums> = BTreeMap::new();
    let mut reconstructed = 0usize;

    for row in series_list.iter().flatten() {
        let sums = buckets.entry(row.bucket_key.clone()).or_insert(BucketSums {
            exact: true,
            ..BucketSums::default()
        });
        if row.sum_secondary.is_none() {
            reconstructed += 1;
            sums.exact = false;
        }
        sums.primary += row.sum_primary;
        sums.secondary += row.secondary_or_reconstructed(basis);
    }

    if reconstructed > 0 {
        tracing::debug!(
            rows = reconstructed,
            "Merged {} rows with secondary sums reconstructed from ratios",
            reconstructed
        );
    }

    buckets
        .into_iter()
        .map(|(key, sums)| {
            let mut row = AggregateRow::from_sums(key, sums.primary, sums.secondary, basis);
            if !sums.exact {
                row.sum_secondary = None;
            }
            row
        })
        .collect()
}
