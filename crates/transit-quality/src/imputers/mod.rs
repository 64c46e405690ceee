//! Imputation module for handling missing and invalid values.
//!
//! This module provides the cascading imputation policy:
//! - Constant substitution
//! - Linear interpolation over an order index
//! - Range invalidation followed by re-interpolation

mod cascade;
mod strategies;

pub use cascade::{
    FieldReport, FieldRule, FieldStatus, ImputationRule, ImputedFields, Imputer, impute,
};
pub use strategies::{ValidRange, fill_constant, interpolate_linear, invalidate_out_of_range};
