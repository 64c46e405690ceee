//! The `Pipeline` struct and its builder.

use crate::config::{ConfigValidationError, PipelineConfig};
use crate::datasets::DatasetSpec;
use crate::densify::{DenseTable, ValueSource, densify_frame};
use crate::error::{QualityError, Result, ResultExt};
use crate::imputers::{FieldStatus, Imputer};
use crate::outliers::OutlierHandler;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::scoring::{PredictionTable, Scorer, score_dense_table};
use crate::types::CleaningSummary;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A corrected table and what was done to it.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub data: DataFrame,
    pub summary: CleaningSummary,
}

/// Runs outlier capping, imputation, densification and scoring.
///
/// Cleaning and densification are independent calls; a run may use either
/// or both. Every call takes its input by reference and returns a new table.
///
/// # Example
///
/// ```rust,ignore
/// use transit_quality::{BaselineScorer, DatasetSpec, Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::builder().iqr_multiplier(3.0).build()?)
///     .build()?;
///
/// let cleaned = pipeline.clean(&raw_daily, &DatasetSpec::daily_boarding())?;
/// let dense = pipeline.densify(&patterns)?;
/// let predictions = pipeline.predict(&dense, &BaselineScorer)?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cap outliers, impute missing values and tidy one table.
    ///
    /// Steps run in a fixed order: column selection, IQR capping of the
    /// spec's outlier columns, the imputation cascade, date parsing, and
    /// finally column drops.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::Unresolved`] when a field still has missing
    /// values after imputation and `fail_on_unresolved` is set.
    pub fn clean(&self, df: &DataFrame, spec: &DatasetSpec) -> Result<CleanedTable> {
        self.finish(self.clean_internal(df, spec), "Cleaning")
    }

    /// Expand a sparse observation table to its full key space.
    pub fn densify(&self, df: &DataFrame) -> Result<DenseTable> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Densification,
            0.0,
            "Densifying key space...",
        ));

        let result = densify_frame(df, &self.config.densify).map(|table| {
            let sources = table.source_counts();
            info!(
                "Densified {} observations into {} cells ({} observed, {} entity-hour mean, {} default)",
                df.height(),
                table.len(),
                sources.get(&ValueSource::Observed).copied().unwrap_or(0),
                sources.get(&ValueSource::EntityTertiaryMean).copied().unwrap_or(0),
                sources.get(&ValueSource::Default).copied().unwrap_or(0),
            );
            table
        });
        self.finish(result, "Densification")
    }

    /// Score every cell of a dense table.
    pub fn predict(&self, dense: &DenseTable, scorer: &dyn Scorer) -> Result<PredictionTable> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Scoring,
            0.0,
            format!("Scoring {} cells with '{}'", dense.len(), scorer.name()),
        ));
        let result = score_dense_table(dense, scorer, self.config.prediction_decimals);
        self.finish(result, "Scoring")
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn finish<T>(&self, result: Result<T>, operation: &str) -> Result<T> {
        match result {
            Ok(value) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "{} completed successfully",
                    operation
                )));
                Ok(value)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("{} error: {}", operation, e);
                Err(e)
            }
        }
    }

    fn clean_internal(&self, df: &DataFrame, spec: &DatasetSpec) -> Result<CleanedTable> {
        let start_time = Instant::now();

        info!("Cleaning dataset '{}' ({} rows)", spec.name, df.height());
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            format!("Cleaning dataset '{}'", spec.name),
        ));

        let mut summary = CleaningSummary::new(&spec.name);
        summary.rows = df.height();
        summary.columns_before = df.width();

        let selected = spec
            .select_columns(df)
            .context(format!("Selecting columns for '{}'", spec.name))?;

        // Step 1: outlier capping
        let outlier_columns = spec.outlier_columns.resolve(&selected)?;
        self.report_progress(ProgressUpdate::with_items(
            PipelineStage::OutlierCapping,
            format!("{} column(s)", outlier_columns.len()),
            0,
            outlier_columns.len(),
            "Capping outliers...",
        ));
        let capped = if outlier_columns.is_empty() {
            debug!("No outlier columns selected for '{}'", spec.name);
            selected
        } else {
            let (capped, outliers) = OutlierHandler::cap_columns(
                &selected,
                &outlier_columns,
                spec.group_key.as_deref(),
                self.config.iqr_multiplier,
            )?;
            summary.outliers = outliers;
            capped
        };
        info!(
            "Capped {} outliers in {} column(s) (multiplier {})",
            summary.total_outliers(),
            outlier_columns.len(),
            self.config.iqr_multiplier
        );

        // Step 2: imputation cascade
        let rules = spec.field_rules(&capped)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Imputation,
            0.0,
            format!("Applying {} imputation rule(s)", rules.len()),
        ));
        let (imputed, reports) = Imputer::apply_to_frame(&capped, &rules, spec.order_by.as_deref())?;

        let unresolved: Vec<String> = reports
            .iter()
            .filter(|r| r.status == FieldStatus::Unresolved)
            .map(|r| r.field.clone())
            .collect();
        if !unresolved.is_empty() {
            warn!(
                "Fields left with missing values in '{}': {}",
                spec.name,
                unresolved.join(", ")
            );
            if self.config.fail_on_unresolved {
                return Err(QualityError::Unresolved(unresolved.join(", ")));
            }
        }
        summary.fields = reports;
        summary.unresolved_fields = unresolved;

        // Step 3: date parsing and drops
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Finalizing,
            0.0,
            "Finalizing table...",
        ));
        let mut data = imputed;
        if let Some(date_column) = &spec.date_column {
            let parsed = date_column.parse(&data)?;
            data.replace(&date_column.name, parsed)?;
            debug!("Parsed '{}' as {:?}", date_column.name, date_column.kind);
        }

        for column in &spec.drop_columns {
            if data.column(column).is_ok() {
                data = data.drop(column)?;
                summary.dropped_columns.push(column.clone());
            }
        }

        summary.columns_after = data.width();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Cleaned '{}': {} rows, {} -> {} columns in {}ms",
            spec.name, summary.rows, summary.columns_before, summary.columns_after, summary.duration_ms
        );

        Ok(CleanedTable { data, summary })
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let pipeline = Pipeline::builder()
    ///     .on_progress(|update| {
    ///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
    ///     })
    ///     .build()?;
    /// ```
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
