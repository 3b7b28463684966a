//! Join category-partitioned series into one stacked table

use crate::models::aggregate::{AggregateRow, BucketKey, StackedRow};
use crate::models::record::Category;
use std::collections::{BTreeMap, BTreeSet};

/// Build one row per bucket with one column per tracked category.
///
/// Every tracked category is present in every row; a bucket missing from a
/// category's series reads 0. With `active_filter` set, every other category is
/// forced to 0 while the filtered one keeps its values.
pub fn stack(
    series_by_category: &BTreeMap<Category, Vec<AggregateRow>>,
    active_filter: Option<&Category>,
) -> Vec<StackedRow> {
    let keys: BTreeSet<&BucketKey> = series_by_category
        .values()
        .flatten()
        .map(|row| &row.bucket_key)
        .collect();

    let lookup: BTreeMap<&Category, BTreeMap<&BucketKey, f64>> = series_by_category
        .iter()
        .map(|(category, rows)| {
            let by_key = rows
                .iter()
                .map(|row| (&row.bucket_key, row.sum_primary))
                .collect();
            (category, by_key)
        })
        .collect();

    keys.into_iter()
        .map(|key| {
            let values: BTreeMap<Category, f64> = lookup
                .iter()
                .map(|(&category, by_key)| {
                    let suppressed = active_filter.is_some_and(|filter| filter != category);
                    let value = if suppressed {
                        0.0
                    } else {
                        by_key.get(key).copied().unwrap_or(0.0)
                    };
                    (category.clone(), value)
                })
                .collect();
            let all = values.values().sum();
            StackedRow {
                bucket_key: key.clone(),
                values,
                all,
            }
        })
        .collect()
}
