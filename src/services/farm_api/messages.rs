//! Wire types of the farm REST API

use crate::models::aggregate::{AggregateRow, MetricBasis};
use crate::models::record::{EntityId, RawRecord};
use crate::models::request::Period;
use crate::series::bucket::bucket_key_for_str;
use serde::{Deserialize, Deserializer};

/// Decimal fields come back as JSON strings ("12.50") or numbers depending on
/// serializer settings. Unparseable text reads as absent.
fn decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Decimal>::deserialize(deserializer)? {
        Some(Decimal::Number(n)) => Some(n),
        Some(Decimal::Text(t)) => t.trim().parse().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarvestRecordWire {
    #[serde(default)]
    pub product: Option<EntityId>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub cultivation_type: Option<String>,
    #[serde(default, deserialize_with = "decimal")]
    pub quantity_kg: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub area_m2: Option<f64>,
}

impl HarvestRecordWire {
    pub fn into_raw(self, requested: EntityId) -> RawRecord {
        RawRecord {
            entity_id: self.product.unwrap_or(requested),
            date: self.date,
            category: self.cultivation_type,
            quantity: self.quantity_kg,
            secondary_quantity: self.area_m2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleRecordWire {
    #[serde(default)]
    pub product: Option<EntityId>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "decimal")]
    pub quantity_kg: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub total_amount: Option<f64>,
}

impl SaleRecordWire {
    /// The amount is the secondary quantity; it is derived from the unit price when
    /// the row predates stored totals.
    pub fn into_raw(self, requested: EntityId) -> RawRecord {
        let amount = match (self.total_amount, self.quantity_kg, self.unit_price) {
            (Some(total), _, _) if total != 0.0 => Some(total),
            (_, Some(qty), Some(price)) => Some(qty * price),
            (total, _, _) => total,
        };
        RawRecord {
            entity_id: self.product.unwrap_or(requested),
            date: self.date,
            category: self.market,
            quantity: self.quantity_kg,
            secondary_quantity: amount,
        }
    }
}

/// `/harvests/aggregate/` row. `date` is the truncated period start.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestAggregateWire {
    pub date: String,
    #[serde(default, deserialize_with = "decimal")]
    pub sum_quantity_kg: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub avg_yield_kg_per_m2: Option<f64>,
    /// Only present on backends that expose raw sums.
    #[serde(default, deserialize_with = "decimal")]
    pub sum_area_m2: Option<f64>,
}

impl HarvestAggregateWire {
    pub fn into_row(self, period: Period) -> Option<AggregateRow> {
        let key = bucket_key_for_str(&self.date, period)?;
        let sum_primary = self.sum_quantity_kg.unwrap_or(0.0);
        Some(match self.sum_area_m2 {
            Some(area) => {
                AggregateRow::from_sums(key, sum_primary, area, MetricBasis::PrimaryPerSecondary)
            }
            None => AggregateRow::ratio_only(
                key,
                sum_primary,
                self.avg_yield_kg_per_m2.unwrap_or(0.0),
            ),
        })
    }
}

/// `/sales/aggregate/` row.
///
/// `avg_unit_price` is an unweighted mean of per-sale prices and is ignored; the
/// weighted price comes from the two sums.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleAggregateWire {
    pub date: String,
    #[serde(default, deserialize_with = "decimal")]
    pub sum_quantity_kg: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub avg_unit_price: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    pub sum_total_amount: Option<f64>,
}

impl SaleAggregateWire {
    pub fn into_row(self, period: Period) -> Option<AggregateRow> {
        let key = bucket_key_for_str(&self.date, period)?;
        Some(AggregateRow::from_sums(
            key,
            self.sum_quantity_kg.unwrap_or(0.0),
            self.sum_total_amount.unwrap_or(0.0),
            MetricBasis::SecondaryPerPrimary,
        ))
    }
}
