//! Unit tests for period bucketing

use chrono::NaiveDate;
use cropledger::models::{BucketKey, Period};
use cropledger::series::bucket::{bucket_key, bucket_key_for_str};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_day_and_month_keys() {
    assert_eq!(bucket_key(date(2024, 3, 1), Period::Day).as_str(), "2024-03-01");
    assert_eq!(bucket_key(date(2024, 3, 1), Period::Month).as_str(), "2024-03");
    assert_eq!(bucket_key(date(2024, 12, 31), Period::Month).as_str(), "2024-12");
}

#[test]
fn test_week_keys_use_iso_week_year() {
    // Monday of the week holding 2025's first Thursday
    assert_eq!(bucket_key(date(2024, 12, 30), Period::Week).as_str(), "2025-W01");
    assert_eq!(bucket_key(date(2025, 1, 1), Period::Week).as_str(), "2025-W01");
    // Sunday still belongs to the previous year's last week
    assert_eq!(bucket_key(date(2021, 1, 3), Period::Week).as_str(), "2020-W53");
    assert_eq!(bucket_key(date(2021, 1, 4), Period::Week).as_str(), "2021-W01");
}

#[test]
fn test_week_is_zero_padded() {
    assert_eq!(bucket_key(date(2024, 2, 26), Period::Week).as_str(), "2024-W09");
}

#[test]
fn test_every_day_of_a_year_gets_a_key() {
    let mut day = date(2020, 1, 1);
    while day <= date(2021, 1, 10) {
        for period in [Period::Day, Period::Week, Period::Month] {
            assert!(!bucket_key(day, period).as_str().is_empty());
        }
        day = day.succ_opt().unwrap();
    }
}

#[test]
fn test_keys_sort_chronologically() {
    let a = bucket_key(date(2024, 9, 30), Period::Week);
    let b = bucket_key(date(2024, 10, 7), Period::Week);
    assert!(a < b);
}

#[test]
fn test_bucket_key_for_str_accepts_timestamps() {
    assert_eq!(
        bucket_key_for_str("2024-03-04T00:00:00Z", Period::Week),
        Some(BucketKey::new("2024-W10"))
    );
    assert_eq!(bucket_key_for_str("not a date", Period::Day), None);
}

#[test]
fn test_first_day_round_trips() {
    assert_eq!(
        BucketKey::new("2025-W01").first_day(Period::Week),
        Some(date(2024, 12, 30))
    );
    assert_eq!(
        BucketKey::new("2024-03").first_day(Period::Month),
        Some(date(2024, 3, 1))
    );
    assert_eq!(BucketKey::new("garbage").first_day(Period::Week), None);
}

#[test]
fn test_labels() {
    assert_eq!(BucketKey::new("2024-03").label(Period::Month), "Mar 2024");
    assert_eq!(BucketKey::new("2024-W09").label(Period::Week), "W09 2024");
    assert_eq!(BucketKey::new("2024-03-01").label(Period::Day), "01 Mar 2024");
    assert_eq!(BucketKey::new("oops").label(Period::Month), "oops");
}
