use crate::error::ParseError;
use crate::models::aggregate::MetricBasis;
use crate::models::record::{Category, CategoryKey, EntityId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(ParseError::new("period", other)),
        }
    }
}

/// Record family the series is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Primary = kg harvested, secondary = m² harvested, category = cultivation method.
    #[default]
    Harvests,
    /// Primary = kg sold, secondary = amount, category = market.
    Sales,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Harvests => "harvests",
            Dataset::Sales => "sales",
        }
    }

    pub fn metric_basis(&self) -> MetricBasis {
        match self {
            Dataset::Harvests => MetricBasis::PrimaryPerSecondary,
            Dataset::Sales => MetricBasis::SecondaryPerPrimary,
        }
    }

    /// Categories that get their own column in the stacked series.
    pub fn tracked_categories(&self) -> Vec<Category> {
        match self {
            Dataset::Harvests => vec![Category::Serre, Category::PleinChamp],
            Dataset::Sales => ["velleron", "direct", "other"]
                .into_iter()
                .filter_map(|key| CategoryKey::new(key).ok())
                .map(Category::Custom)
                .collect(),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "harvests" => Ok(Dataset::Harvests),
            "sales" => Ok(Dataset::Sales),
            other => Err(ParseError::new("dataset", other)),
        }
    }
}

/// Inclusive date range; an open bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn is_valid(&self) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }
}

/// What the consumer wants to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    #[serde(default)]
    pub dataset: Dataset,
    pub entities: Vec<EntityId>,
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub category_filter: Option<Category>,
}

impl SeriesRequest {
    pub fn new(dataset: Dataset, entities: Vec<EntityId>, period: Period) -> Self {
        Self {
            dataset,
            entities,
            period,
            date_range: DateRange::default(),
            category_filter: None,
        }
    }

    pub fn with_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category_filter = Some(category);
        self
    }

    /// Entities sorted and deduplicated, so a repeated id is never counted twice.
    pub fn distinct_entities(&self) -> Vec<EntityId> {
        let mut entities = self.entities.clone();
        entities.sort_unstable();
        entities.dedup();
        entities
    }
}
