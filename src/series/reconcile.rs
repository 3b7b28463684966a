//! Fallback to local recomputation when a remote aggregate slice comes back empty

use crate::models::aggregate::{AggregateRow, MetricBasis};
use crate::models::record::{Category, Record};
use crate::models::request::Period;
use crate::series::aggregation::RawAggregator;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciled {
    pub rows: Vec<AggregateRow>,
    pub used_fallback: bool,
}

/// Reconcile with the yield basis.
pub fn reconcile(
    remote_result: Vec<AggregateRow>,
    raw_records: &[Record],
    period: Period,
    category_filter: Option<&Category>,
) -> Reconciled {
    reconcile_with_basis(
        remote_result,
        raw_records,
        period,
        category_filter,
        MetricBasis::PrimaryPerSecondary,
    )
}

/// Substitute the local aggregate when the remote slice is empty but raw data exists.
///
/// An empty remote result with no matching raw records is accepted as genuinely empty.
pub fn reconcile_with_basis(
    remote_result: Vec<AggregateRow>,
    raw_records: &[Record],
    period: Period,
    category_filter: Option<&Category>,
    basis: MetricBasis,
) -> Reconciled {
    if remote_result.is_empty() && RawAggregator::has_matching(raw_records, category_filter) {
        return Reconciled {
            rows: RawAggregator::aggregate_with_basis(raw_records, period, category_filter, basis),
            used_fallback: true,
        };
    }

    Reconciled {
        rows: remote_result,
        used_fallback: false,
    }
}
