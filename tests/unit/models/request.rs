//! Unit tests for request types

use chrono::NaiveDate;
use cropledger::models::{Category, DateRange, Dataset, MetricBasis, Period, SeriesRequest};

#[test]
fn test_period_parsing() {
    assert_eq!("week".parse::<Period>().unwrap(), Period::Week);
    assert_eq!(Period::Month.to_string(), "month");
    let err = "year".parse::<Period>().unwrap_err();
    assert_eq!(err.field, "period");
}

#[test]
fn test_dataset_basis_and_categories() {
    assert_eq!(Dataset::Harvests.metric_basis(), MetricBasis::PrimaryPerSecondary);
    assert_eq!(Dataset::Sales.metric_basis(), MetricBasis::SecondaryPerPrimary);
    assert_eq!(
        Dataset::Harvests.tracked_categories(),
        vec![Category::Serre, Category::PleinChamp]
    );
    let markets: Vec<String> = Dataset::Sales
        .tracked_categories()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(markets, vec!["velleron", "direct", "other"]);
}

#[test]
fn test_date_range() {
    let march = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 3, 1),
        NaiveDate::from_ymd_opt(2024, 3, 31),
    );
    assert!(march.is_valid());
    assert!(march.contains(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
    assert!(!march.contains(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));

    let open = DateRange::default();
    assert!(open.contains(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()));

    let inverted = DateRange::new(march.to, march.from);
    assert!(!inverted.is_valid());
}

#[test]
fn test_distinct_entities() {
    let request = SeriesRequest::new(Dataset::Harvests, vec![3, 1, 3, 2], Period::Day);
    assert_eq!(request.distinct_entities(), vec![1, 2, 3]);
}

#[test]
fn test_request_deserialises_with_defaults() {
    let request: SeriesRequest = serde_json::from_str(r#"{"entities": [4]}"#).unwrap();
    assert_eq!(request.dataset, Dataset::Harvests);
    assert_eq!(request.period, Period::Day);
    assert_eq!(request.category_filter, None);
}
