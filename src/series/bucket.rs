//! Period bucketing: calendar date + granularity -> sortable bucket key

use crate::models::aggregate::BucketKey;
use crate::models::record::parse_iso_date;
use crate::models::request::Period;
use chrono::{Datelike, NaiveDate, Weekday};

/// Map a date to the key of the period containing it.
///
/// Weeks follow ISO-8601: Monday start, week 1 holds the year's first Thursday,
/// and the key uses the week-year, which differs from the calendar year around
/// January 1st (2024-12-30 is `2025-W01`, 2021-01-03 is `2020-W53`).
pub fn bucket_key(date: NaiveDate, period: Period) -> BucketKey {
    match period {
        Period::Day => BucketKey::new(date.format("%Y-%m-%d").to_string()),
        Period::Month => BucketKey::new(date.format("%Y-%m").to_string()),
        Period::Week => {
            let week = date.iso_week();
            BucketKey::new(format!("{:04}-W{:02}", week.year(), week.week()))
        }
    }
}

/// Same as `bucket_key` for an ISO date string; `None` if it does not parse.
pub fn bucket_key_for_str(date: &str, period: Period) -> Option<BucketKey> {
    parse_iso_date(date).map(|d| bucket_key(d, period))
}

impl BucketKey {
    /// First calendar day of the period this key names.
    pub fn first_day(&self, period: Period) -> Option<NaiveDate> {
        let key = self.as_str();
        match period {
            Period::Day => NaiveDate::parse_from_str(key, "%Y-%m-%d").ok(),
            Period::Month => NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok(),
            Period::Week => {
                let (year, week) = key.split_once("-W")?;
                NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)
            }
        }
    }

    /// Human-readable label. Falls back to the raw key when it does not parse.
    pub fn label(&self, period: Period) -> String {
        let Some(first_day) = self.first_day(period) else {
            return self.to_string();
        };
        match period {
            Period::Day => first_day.format("%d %b %Y").to_string(),
            Period::Week => {
                let week = first_day.iso_week();
                format!("W{:02} {}", week.week(), week.year())
            }
            Period::Month => first_day.format("%b %Y").to_string(),
        }
    }
}
