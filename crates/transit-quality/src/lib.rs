//! Transit Data-Quality Engine
//!
//! Batch correction and densification of bus ridership tables, built on
//! Polars.
//!
//! # Overview
//!
//! - **Route filtering**: keeps the target routes of the monthly city
//!   exports and stacks the months into one table
//! - **Outlier capping**: IQR bounds computed from positive values only,
//!   flagged values replaced with the largest retained value, optionally
//!   isolated per group (e.g. per route)
//! - **Imputation cascade**: constant substitution, linear interpolation over
//!   an order index, and range invalidation followed by re-interpolation
//! - **Densification**: expansion of sparse `(stop, day of week, hour)`
//!   observations to the full key space with an `(stop, hour)` mean fallback
//! - **Scoring**: a [`Scorer`] seam for an external model and the nested
//!   lookup JSON consumed by the web client
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use transit_quality::{BaselineScorer, DatasetSpec, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::builder()
//!     .config(PipelineConfig::builder().iqr_multiplier(3.0).build()?)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! // Correct the daily boarding table
//! let cleaned = pipeline.clean(&daily_df, &DatasetSpec::daily_boarding())?;
//! println!("{} outliers capped", cleaned.summary.total_outliers());
//!
//! // Build the dense prediction lookup
//! let dense = pipeline.densify(&patterns_df)?;
//! let predictions = pipeline.predict(&dense, &BaselineScorer)?;
//! let lookup = predictions.to_lookup_json(2);
//! ```
//!
//! # Determinism
//!
//! Every stage is a pure function of its input: the same input always yields
//! the same output, and capping an already-capped series flags nothing.

pub mod config;
pub mod datasets;
pub mod densify;
pub mod error;
pub mod imputers;
pub mod outliers;
pub mod pipeline;
pub mod reporting;
pub mod routes;
pub mod scoring;
pub mod stops;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, DensifyConfig, KeyColumns, PipelineConfig, PipelineConfigBuilder,
};
pub use datasets::{ColumnSelector, DateColumn, DatasetSpec, SelectorRule, TemporalKind};
pub use densify::{
    DenseRow, DenseTable, DimensionDomains, Observation, ValueSource, densify, densify_frame,
};
pub use error::{QualityError, Result, ResultExt};
pub use imputers::{
    FieldReport, FieldRule, FieldStatus, ImputationRule, ImputedFields, Imputer, ValidRange,
    impute,
};
pub use outliers::{CapOutcome, Capper, IqrBounds, OutlierDetector, OutlierHandler, detect_and_cap};
pub use pipeline::{
    CleanedTable, ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use reporting::{CleaningReport, ReportGenerator};
pub use routes::{concat_frames, count_by_route, filter_routes};
pub use scoring::{BaselineScorer, FeatureRow, Prediction, PredictionTable, Scorer, score_dense_table};
pub use stops::{Direction, Stop, build_stop_directory};
pub use types::{CleaningSummary, GroupKey, KeyTuple, OutlierMask, OutlierSummary};
