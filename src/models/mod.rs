//! Shared data models spanning the engine layers.

pub mod aggregate;
pub mod record;
pub mod request;

pub use aggregate::{AggregateRow, BucketKey, MetricBasis, SeriesResponse, StackedRow};
pub use record::{
    parse_iso_date, validate_records, Category, CategoryKey, EntityId, RawRecord, Record,
    ValidatedRecords,
};
pub use request::{DateRange, Dataset, Period, SeriesRequest};
