//! Data sources the engine depends on.

pub mod farm_api;
pub mod farm_data;
pub mod memory;

pub use farm_api::FarmApiClient;
pub use farm_data::{AggregateSource, RecordSource};
pub use memory::InMemorySource;
