//! Pipeline module.
//!
//! This module provides the batch pipeline and its progress reporting.

mod builder;
pub mod progress;

pub use builder::{CleanedTable, Pipeline, PipelineBuilder};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
