//! Temporal aggregation and reconciliation engine for farm operational records.
//!
//! Raw harvest and sale records are bucketed by day, ISO week or month, merged
//! across selected products, patched with local recomputation when the remote
//! aggregate endpoint comes back empty, and stacked per category for charting.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod series;
pub mod services;
