use crate::models::record::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical period identifier: `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`.
///
/// Lexicographic order is chronological order within one period granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(String);

impl BucketKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BucketKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Direction of the weighted ratio carried in `AggregateRow::derived_metric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricBasis {
    /// `Σprimary / Σsecondary` (harvest yield in kg/m²)
    #[default]
    PrimaryPerSecondary,
    /// `Σsecondary / Σprimary` (sale unit price in €/kg)
    SecondaryPerPrimary,
}

impl MetricBasis {
    /// Weighted ratio from sums. A zero or negative denominator yields 0.
    pub fn ratio(self, sum_primary: f64, sum_secondary: f64) -> f64 {
        let (numerator, denominator) = match self {
            MetricBasis::PrimaryPerSecondary => (sum_primary, sum_secondary),
            MetricBasis::SecondaryPerPrimary => (sum_secondary, sum_primary),
        };
        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }

    /// Inverse of `ratio`: recovers the secondary sum from the primary sum and the ratio.
    ///
    /// Approximate when the ratio was rounded upstream.
    pub fn reconstruct_secondary(self, sum_primary: f64, derived_metric: f64) -> f64 {
        match self {
            MetricBasis::PrimaryPerSecondary => {
                if derived_metric > 0.0 {
                    sum_primary / derived_metric
                } else {
                    0.0
                }
            }
            MetricBasis::SecondaryPerPrimary => derived_metric * sum_primary,
        }
    }
}

/// One bucket's summed primary quantity and its weighted derived metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub bucket_key: BucketKey,
    pub sum_primary: f64,
    pub derived_metric: f64,
    /// Raw secondary sum, when the producer exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_secondary: Option<f64>,
}

impl AggregateRow {
    pub fn from_sums(
        bucket_key: BucketKey,
        sum_primary: f64,
        sum_secondary: f64,
        basis: MetricBasis,
    ) -> Self {
        Self {
            bucket_key,
            sum_primary,
            derived_metric: basis.ratio(sum_primary, sum_secondary),
            sum_secondary: Some(sum_secondary),
        }
    }

    /// Row carrying only the ratio, as a ratio-only remote endpoint returns it.
    pub fn ratio_only(bucket_key: BucketKey, sum_primary: f64, derived_metric: f64) -> Self {
        Self {
            bucket_key,
            sum_primary,
            derived_metric,
            sum_secondary: None,
        }
    }

    /// Exact secondary sum if known, reconstructed from the ratio otherwise.
    pub fn secondary_or_reconstructed(&self, basis: MetricBasis) -> f64 {
        self.sum_secondary
            .unwrap_or_else(|| basis.reconstruct_secondary(self.sum_primary, self.derived_metric))
    }
}

/// One bucket of the stacked, category-partitioned table.
///
/// Serialises flat: `{"bucket_key": "2024-03", "serre": 100.0, "plein_champ": 40.0, "all": 140.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedRow {
    pub bucket_key: BucketKey,
    #[serde(flatten)]
    pub values: BTreeMap<Category, f64>,
    pub all: f64,
}

impl StackedRow {
    /// Value for a category; categories not tracked in this row read as 0.
    pub fn value(&self, category: &Category) -> f64 {
        self.values.get(category).copied().unwrap_or(0.0)
    }
}

/// Result handed to the presentation consumer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub rows: Vec<StackedRow>,
    /// The "all categories" slice with its weighted derived metric.
    pub totals: Vec<AggregateRow>,
    /// True when any slice was computed locally instead of remotely.
    pub used_fallback: bool,
    /// Labels of the slices that fell back ("all", "serre", ...).
    #[serde(default)]
    pub fallback_slices: Vec<String>,
    /// Labels of the slices the aggregate source cannot narrow by category; always local.
    #[serde(default)]
    pub local_slices: Vec<String>,
    /// Entities whose fetch failed and that were left out of the result.
    pub partial_errors: Vec<crate::models::record::EntityId>,
    /// Raw records dropped because they were malformed.
    pub excluded_records: usize,
}
