//! Unit tests for record validation and categories

use cropledger::error::RecordError;
use cropledger::models::{validate_records, Category, CategoryKey, RawRecord, Record};
use tokio_test::assert_ok;

#[test]
fn test_valid_record() {
    let raw = RawRecord::new(3, "2024-03-01", 12.5)
        .with_category("serre")
        .with_secondary(4.0);
    let record = assert_ok!(Record::try_from(raw));
    assert_eq!(record.entity_id, 3);
    assert_eq!(record.category, Some(Category::Serre));
    assert_eq!(record.secondary_quantity, Some(4.0));
}

#[test]
fn test_timestamp_dates_are_truncated() {
    let raw = RawRecord::new(1, "2024-03-01T08:30:00Z", 1.0);
    let record = Record::try_from(raw).unwrap();
    assert_eq!(record.date.to_string(), "2024-03-01");
}

#[test]
fn test_malformed_records() {
    let missing_date = RawRecord {
        entity_id: 1,
        quantity: Some(1.0),
        ..RawRecord::default()
    };
    assert_eq!(
        Record::try_from(missing_date),
        Err(RecordError::MissingDate { entity_id: 1 })
    );

    assert!(matches!(
        Record::try_from(RawRecord::new(1, "2024-13-45", 1.0)),
        Err(RecordError::InvalidDate { .. })
    ));
    assert_eq!(
        Record::try_from(RawRecord::new(2, "2024-03-01", f64::NAN)),
        Err(RecordError::MissingQuantity { entity_id: 2 })
    );
    assert_eq!(
        Record::try_from(RawRecord::new(2, "2024-03-01", 1.0).with_secondary(f64::INFINITY)),
        Err(RecordError::InvalidSecondary { entity_id: 2 })
    );
    assert!(matches!(
        Record::try_from(RawRecord::new(2, "2024-03-01", 1.0).with_category("Not Valid")),
        Err(RecordError::InvalidCategory { .. })
    ));
}

#[test]
fn test_empty_category_means_uncategorised() {
    let record = Record::try_from(RawRecord::new(1, "2024-03-01", 1.0).with_category("")).unwrap();
    assert_eq!(record.category, None);
    assert!(record.matches(None));
    assert!(!record.matches(Some(&Category::Serre)));
}

#[test]
fn test_validate_counts_exclusions() {
    let validated = validate_records(vec![
        RawRecord::new(1, "2024-03-01", 1.0),
        RawRecord::new(1, "yesterday", 1.0),
        RawRecord::new(1, "2024-03-02", f64::INFINITY),
        RawRecord::new(1, "2024-03-03", 2.0),
    ]);
    assert_eq!(validated.records.len(), 2);
    assert_eq!(validated.excluded, 2);
}

#[test]
fn test_category_keys() {
    assert_eq!("plein_champ".parse::<Category>().unwrap(), Category::PleinChamp);
    assert_eq!(
        "velleron".parse::<Category>().unwrap(),
        Category::Custom(CategoryKey::new("velleron").unwrap())
    );
    assert!(CategoryKey::new("").is_err());
    assert!(CategoryKey::new("all").is_err());
    assert!(CategoryKey::new("bucket_key").is_err());
    assert!(CategoryKey::new("Upper").is_err());
    assert!(CategoryKey::new(&"x".repeat(33)).is_err());
}

#[test]
fn test_category_serde_uses_wire_names() {
    let json = serde_json::to_string(&Category::PleinChamp).unwrap();
    assert_eq!(json, "\"plein_champ\"");
    let parsed: Category = serde_json::from_str("\"direct\"").unwrap();
    assert_eq!(parsed.as_str(), "direct");
    assert!(serde_json::from_str::<Category>("\"all\"").is_err());
}
