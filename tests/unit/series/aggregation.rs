//! Unit tests for the raw aggregator

use chrono::NaiveDate;
use cropledger::models::{Category, MetricBasis, Period, Record};
use cropledger::series::aggregation::RawAggregator;

fn record(date: &str, category: Option<Category>, quantity: f64, secondary: Option<f64>) -> Record {
    Record {
        entity_id: 1,
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        category,
        quantity,
        secondary_quantity: secondary,
    }
}

fn sample() -> Vec<Record> {
    vec![
        record("2024-03-01", Some(Category::Serre), 100.0, Some(50.0)),
        record("2024-03-02", Some(Category::PleinChamp), 40.0, Some(20.0)),
        record("2024-04-10", Some(Category::Serre), 0.1, Some(0.3)),
        record("2024-03-15", Some(Category::Serre), 0.5, Some(0.25)),
        record("2024-04-11", None, 12.5, None),
    ]
}

#[test]
fn test_month_totals() {
    let rows = RawAggregator::aggregate(&sample(), Period::Month, None);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].bucket_key.as_str(), "2024-03");
    assert_eq!(rows[0].sum_primary, 140.5);
    assert_eq!(rows[0].sum_secondary, Some(70.25));
    assert_eq!(rows[1].bucket_key.as_str(), "2024-04");
}

#[test]
fn test_end_to_end_month_bucket() {
    let records = vec![
        record("2024-03-01", Some(Category::Serre), 100.0, Some(50.0)),
        record("2024-03-02", Some(Category::PleinChamp), 40.0, Some(20.0)),
    ];
    let rows = RawAggregator::aggregate(&records, Period::Month, None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sum_primary, 140.0);
    assert_eq!(rows[0].derived_metric, 2.0);
}

#[test]
fn test_invariant_under_permutation() {
    let records = sample();
    let expected = RawAggregator::aggregate(&records, Period::Week, None);

    let mut reversed = records.clone();
    reversed.reverse();
    assert_eq!(RawAggregator::aggregate(&reversed, Period::Week, None), expected);

    let mut rotated = records;
    rotated.rotate_left(2);
    assert_eq!(RawAggregator::aggregate(&rotated, Period::Week, None), expected);
}

#[test]
fn test_zero_secondary_yields_zero_metric() {
    let records = vec![
        record("2024-03-01", None, 10.0, Some(0.0)),
        record("2024-03-01", None, 5.0, None),
    ];
    let rows = RawAggregator::aggregate(&records, Period::Day, None);
    assert_eq!(rows[0].sum_primary, 15.0);
    assert_eq!(rows[0].derived_metric, 0.0);
    assert!(rows[0].derived_metric.is_finite());
}

#[test]
fn test_secondary_per_primary_basis() {
    let records = vec![
        record("2024-03-01", None, 10.0, Some(25.0)),
        record("2024-03-05", None, 30.0, Some(45.0)),
    ];
    let rows = RawAggregator::aggregate_with_basis(
        &records,
        Period::Month,
        None,
        MetricBasis::SecondaryPerPrimary,
    );
    assert_eq!(rows[0].derived_metric, 70.0 / 40.0);
}

#[test]
fn test_category_filter_is_exact() {
    let rows = RawAggregator::aggregate(&sample(), Period::Month, Some(&Category::PleinChamp));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sum_primary, 40.0);
    assert!(!RawAggregator::has_matching(
        &sample(),
        Some(&"velleron".parse().unwrap())
    ));
}

#[test]
fn test_empty_input() {
    assert!(RawAggregator::aggregate(&[], Period::Day, None).is_empty());
}
