//! Scoring of densified tables through an external model.
//!
//! The engine does not train or embed a model. It builds one [`FeatureRow`]
//! per dense cell, hands the batch to a [`Scorer`] and post-processes the
//! returned predictions into a [`PredictionTable`].
//!
//! # Implementing a Scorer
//!
//! ```rust,ignore
//! use transit_quality::scoring::{FeatureRow, Scorer};
//! use transit_quality::Result;
//!
//! struct HourlyBoost;
//!
//! impl Scorer for HourlyBoost {
//!     fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
//!         Ok(rows.iter().map(|r| r.lag1 * 1.1).collect())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "hourly-boost"
//!     }
//! }
//! ```

use crate::config::KeyColumns;
use crate::densify::DenseTable;
use crate::error::{QualityError, Result};
use crate::types::KeyTuple;
use crate::utils::round_to;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// First day-of-week value treated as weekend (Saturday).
pub const WEEKEND_START: i64 = 5;

/// Model input for one dense cell.
///
/// Lag and rolling features are all derived from the densified baseline
/// value of the cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub entity: i64,
    pub tertiary: i64,
    pub secondary: i64,
    pub is_weekend: bool,
    pub lag1: f64,
    pub lag7: f64,
    pub rolling_mean_7d: f64,
    pub entity_tertiary_mean: f64,
}

impl FeatureRow {
    pub fn from_baseline(key: KeyTuple, baseline: f64) -> Self {
        Self {
            entity: key.entity,
            tertiary: key.tertiary,
            secondary: key.secondary,
            is_weekend: key.secondary >= WEEKEND_START,
            lag1: baseline,
            lag7: baseline,
            rolling_mean_7d: baseline,
            entity_tertiary_mean: baseline,
        }
    }

    pub fn key(&self) -> KeyTuple {
        KeyTuple::new(self.entity, self.secondary, self.tertiary)
    }
}

/// A model that turns feature rows into one prediction each.
///
/// Implementations must be `Send + Sync` so a pipeline holding one can be
/// moved to a worker thread.
pub trait Scorer: Send + Sync {
    /// Predict one value per row, in row order.
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>>;

    /// Scorer name for logging.
    fn name(&self) -> &str;
}

/// Returns the densified baseline unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineScorer;

impl Scorer for BaselineScorer {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        Ok(rows.iter().map(|row| row.lag1).collect())
    }

    fn name(&self) -> &str {
        "baseline"
    }
}

/// One scored cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub key: KeyTuple,
    /// Clipped and rounded to the table precision.
    pub value: f64,
    /// Clipped score before rounding; the lookup rounds from this.
    pub raw: f64,
}

/// Predictions for every cell of a dense table, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    predictions: Vec<Prediction>,
}

impl PredictionTable {
    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn get(&self, key: &KeyTuple) -> Option<f64> {
        self.predictions
            .binary_search_by(|p| p.key.cmp(key))
            .ok()
            .map(|i| self.predictions[i].value)
    }

    /// Flat table with the key columns and a `pred` column.
    pub fn to_dataframe(&self, columns: &KeyColumns) -> PolarsResult<DataFrame> {
        let entity: Vec<i64> = self.predictions.iter().map(|p| p.key.entity).collect();
        let secondary: Vec<i64> = self.predictions.iter().map(|p| p.key.secondary).collect();
        let tertiary: Vec<i64> = self.predictions.iter().map(|p| p.key.tertiary).collect();
        let pred: Vec<f64> = self.predictions.iter().map(|p| p.value).collect();

        DataFrame::new(vec![
            Column::new(columns.entity.as_str().into(), entity),
            Column::new(columns.secondary.as_str().into(), secondary),
            Column::new(columns.tertiary.as_str().into(), tertiary),
            Column::new("pred".into(), pred),
        ])
    }

    /// Nested lookup `{ entity: { tertiary: { secondary: value } } }` with
    /// string keys. Values are rounded once, from the unrounded score, to
    /// `decimals`.
    ///
    /// For the weekly-hourly key space this is `stop -> hour -> dow`.
    pub fn to_lookup_json(&self, decimals: u32) -> serde_json::Value {
        let mut nested: BTreeMap<i64, BTreeMap<i64, BTreeMap<i64, f64>>> = BTreeMap::new();
        for p in &self.predictions {
            nested
                .entry(p.key.entity)
                .or_default()
                .entry(p.key.tertiary)
                .or_default()
                .insert(p.key.secondary, round_to(p.raw, decimals));
        }

        let object = nested
            .into_iter()
            .map(|(entity, by_tertiary)| {
                let inner = by_tertiary
                    .into_iter()
                    .map(|(tertiary, by_secondary)| {
                        let leaf = by_secondary
                            .into_iter()
                            .map(|(secondary, value)| (secondary.to_string(), serde_json::json!(value)))
                            .collect::<serde_json::Map<_, _>>();
                        (tertiary.to_string(), serde_json::Value::Object(leaf))
                    })
                    .collect::<serde_json::Map<_, _>>();
                (entity.to_string(), serde_json::Value::Object(inner))
            })
            .collect::<serde_json::Map<_, _>>();

        serde_json::Value::Object(object)
    }
}

/// Score every cell of `dense` with `scorer`.
///
/// The scorer must return exactly one finite value per row. Negative
/// predictions are clipped to zero and every value is rounded to `decimals`.
pub fn score_dense_table(
    dense: &DenseTable,
    scorer: &dyn Scorer,
    decimals: u32,
) -> Result<PredictionTable> {
    let features: Vec<FeatureRow> = dense
        .rows()
        .iter()
        .map(|row| FeatureRow::from_baseline(row.key, row.value))
        .collect();

    debug!("Scoring {} feature rows with '{}'", features.len(), scorer.name());
    let scores = scorer.predict(&features)?;

    if scores.len() != features.len() {
        return Err(QualityError::LengthMismatch {
            field: "predictions".to_string(),
            expected: features.len(),
            actual: scores.len(),
        });
    }

    let mut predictions = Vec::with_capacity(scores.len());
    let mut clipped = 0;
    for (row, value) in features.iter().zip(scores) {
        if !value.is_finite() {
            return Err(QualityError::ScoringFailed(format!(
                "scorer '{}' returned {} for key {:?}",
                scorer.name(),
                value,
                row.key()
            )));
        }
        if value < 0.0 {
            clipped += 1;
        }
        let raw = value.max(0.0);
        predictions.push(Prediction {
            key: row.key(),
            value: round_to(raw, decimals),
            raw,
        });
    }
    predictions.sort_by(|a, b| a.key.cmp(&b.key));

    info!(
        "Scored {} cells with '{}' ({} negative predictions clipped)",
        predictions.len(),
        scorer.name(),
        clipped
    );
    Ok(PredictionTable { predictions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densify::{DimensionDomains, Observation, densify};

    struct FixedScorer(Vec<f64>);

    impl Scorer for FixedScorer {
        fn predict(&self, _rows: &[FeatureRow]) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn small_table() -> DenseTable {
        let domains = DimensionDomains::new([1], [0, 6], [8]);
        densify(
            &[Observation::new(KeyTuple::new(1, 0, 8), 12.345678)],
            &domains,
            0.0,
        )
    }

    #[test]
    fn test_feature_row_weekend_flag() {
        assert!(!FeatureRow::from_baseline(KeyTuple::new(1, 4, 0), 1.0).is_weekend);
        assert!(FeatureRow::from_baseline(KeyTuple::new(1, 5, 0), 1.0).is_weekend);
        assert!(FeatureRow::from_baseline(KeyTuple::new(1, 6, 0), 1.0).is_weekend);
    }

    #[test]
    fn test_baseline_scorer_rounds() {
        let table = score_dense_table(&small_table(), &BaselineScorer, 4).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&KeyTuple::new(1, 0, 8)), Some(12.3457));
        // (1, 6, 8) falls back to the (entity, hour) mean.
        assert_eq!(table.get(&KeyTuple::new(1, 6, 8)), Some(12.3457));
    }

    #[test]
    fn test_negative_predictions_clipped() {
        let table = score_dense_table(&small_table(), &FixedScorer(vec![-3.0, 2.5]), 4).unwrap();
        assert_eq!(table.predictions()[0].value, 0.0);
        assert_eq!(table.predictions()[1].value, 2.5);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = score_dense_table(&small_table(), &FixedScorer(vec![1.0]), 4).unwrap_err();
        assert_eq!(err.error_code(), "LENGTH_MISMATCH");
    }

    #[test]
    fn test_non_finite_prediction_rejected() {
        let err =
            score_dense_table(&small_table(), &FixedScorer(vec![1.0, f64::NAN]), 4).unwrap_err();
        assert_eq!(err.error_code(), "SCORING_FAILED");
    }

    #[test]
    fn test_lookup_json_shape() {
        let table = score_dense_table(&small_table(), &BaselineScorer, 4).unwrap();
        let json = table.to_lookup_json(2);
        assert_eq!(json["1"]["8"]["0"], serde_json::json!(12.35));
        assert_eq!(json["1"]["8"]["6"], serde_json::json!(12.35));
    }

    #[test]
    fn test_lookup_json_rounds_raw_score_once() {
        let domains = DimensionDomains::new([3], [0], [7]);
        let dense = densify(&[Observation::new(KeyTuple::new(3, 0, 7), 0.124951)], &domains, 0.0);
        let table = score_dense_table(&dense, &BaselineScorer, 4).unwrap();

        assert_eq!(table.get(&KeyTuple::new(3, 0, 7)), Some(0.125));
        // Rounding the 4-decimal value again would give 0.13.
        assert_eq!(table.to_lookup_json(2)["3"]["7"]["0"], serde_json::json!(0.12));
    }

    #[test]
    fn test_prediction_dataframe() {
        let columns = KeyColumns::default();
        let table = score_dense_table(&small_table(), &BaselineScorer, 4).unwrap();
        let df = table.to_dataframe(&columns).unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column("pred").is_ok());
        assert!(df.column(&columns.entity).is_ok());
    }
}
