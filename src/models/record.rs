//! Farm records as returned by the persistence collaborator, and their validated form.

use crate::error::{ParseError, RecordError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a selectable entity (a product).
pub type EntityId = i64;

const MAX_CATEGORY_KEY_LEN: usize = 32;
const RESERVED_KEYS: [&str; 2] = ["all", "bucket_key"];

/// Free-form category identifier, validated so it can be used as a series column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryKey(String);

impl CategoryKey {
    pub fn new(value: &str) -> Result<Self, ParseError> {
        let valid = !value.is_empty()
            && value.len() <= MAX_CATEGORY_KEY_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            && !RESERVED_KEYS.contains(&value);
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(ParseError::new("category", value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Category a record belongs to.
///
/// Cultivation methods are a closed set; anything else (sale markets, for instance)
/// goes through a validated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Serre,
    PleinChamp,
    Custom(CategoryKey),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Serre => "serre",
            Category::PleinChamp => "plein_champ",
            Category::Custom(key) => key.as_str(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serre" => Ok(Category::Serre),
            "plein_champ" => Ok(Category::PleinChamp),
            other => CategoryKey::new(other).map(Category::Custom),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// Record as handed over by a collaborator, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub entity_id: EntityId,
    pub date: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<f64>,
    pub secondary_quantity: Option<f64>,
}

impl RawRecord {
    pub fn new(entity_id: EntityId, date: &str, quantity: f64) -> Self {
        Self {
            entity_id,
            date: Some(date.to_string()),
            category: None,
            quantity: Some(quantity),
            secondary_quantity: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_secondary(mut self, secondary: f64) -> Self {
        self.secondary_quantity = Some(secondary);
        self
    }
}

/// Validated record. Immutable for the duration of an aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity_id: EntityId,
    pub date: NaiveDate,
    pub category: Option<Category>,
    pub quantity: f64,
    pub secondary_quantity: Option<f64>,
}

impl Record {
    /// Exact category match; an absent filter matches everything.
    pub fn matches(&self, category_filter: Option<&Category>) -> bool {
        match category_filter {
            None => true,
            Some(filter) => self.category.as_ref() == Some(filter),
        }
    }
}

impl TryFrom<RawRecord> for Record {
    type Error = RecordError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let entity_id = raw.entity_id;
        let date_text = raw.date.ok_or(RecordError::MissingDate { entity_id })?;
        let date = parse_iso_date(&date_text).ok_or_else(|| RecordError::InvalidDate {
            entity_id,
            value: date_text.clone(),
        })?;

        let quantity = raw
            .quantity
            .filter(|q| q.is_finite())
            .ok_or(RecordError::MissingQuantity { entity_id })?;

        if raw.secondary_quantity.is_some_and(|s| !s.is_finite()) {
            return Err(RecordError::InvalidSecondary { entity_id });
        }

        let category = match raw.category.as_deref() {
            None | Some("") => None,
            Some(text) => Some(text.parse::<Category>().map_err(|e| {
                RecordError::InvalidCategory {
                    entity_id,
                    reason: e.to_string(),
                }
            })?),
        };

        Ok(Self {
            entity_id,
            date,
            category,
            quantity,
            secondary_quantity: raw.secondary_quantity,
        })
    }
}

/// Parses `YYYY-MM-DD`, tolerating a trailing time component (`2024-03-01T00:00:00Z`).
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let head = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Records that survived validation plus the number that did not.
#[derive(Debug, Clone, Default)]
pub struct ValidatedRecords {
    pub records: Vec<Record>,
    pub excluded: usize,
}

/// Splits raw records into valid ones and a count of excluded ones.
///
/// Exclusions are never silent: each one is logged at debug, the total at warn.
pub fn validate_records(raw: Vec<RawRecord>) -> ValidatedRecords {
    let mut validated = ValidatedRecords::default();
    for candidate in raw {
        match Record::try_from(candidate) {
            Ok(record) => validated.records.push(record),
            Err(e) => {
                tracing::debug!(error = %e, "Excluding malformed record");
                validated.excluded += 1;
            }
        }
    }

    if validated.excluded > 0 {
        tracing::warn!(
            excluded = validated.excluded,
            kept = validated.records.len(),
            "Excluded {} malformed records from aggregation",
            validated.excluded
        );
    }

    validated
}
