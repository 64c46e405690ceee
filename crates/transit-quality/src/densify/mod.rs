//! Dense lookup table reconstruction.
//!
//! A sparse set of `(entity, secondary, tertiary) -> value` observations is
//! expanded to the full cross product of the declared domains so every key
//! has exactly one value.

mod densifier;
mod keyspace;

pub use densifier::{DenseRow, DenseTable, Observation, ValueSource, densify, densify_frame};
pub use keyspace::{DAYS_OF_WEEK, DimensionDomains, HOURS_OF_DAY};
