//! Pure series computations: bucketing, aggregation, merge, reconciliation, stacking.

pub mod aggregation;
pub mod bucket;
pub mod merge;
pub mod reconcile;
pub mod stack;

pub use aggregation::*;
pub use bucket::*;
pub use merge::*;
pub use reconcile::*;
pub use stack::*;
