//! Outlier handling on DataFrame columns.

use super::{detect_and_cap, partition};
use crate::error::{Result, ResultExt};
use crate::types::{GroupKey, OutlierSummary};
use crate::utils::{group_keys, numeric_values, require_column, values_to_series};
use polars::prelude::*;
use tracing::debug;

/// Applies IQR capping to the numeric columns of a table.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Cap outliers in each of `columns`, optionally per `group_key` partition.
    ///
    /// Returns a new DataFrame; the input is left untouched. Every listed
    /// column must exist and be numeric.
    pub fn cap_columns(
        df: &DataFrame,
        columns: &[String],
        group_key: Option<&str>,
        multiplier: f64,
    ) -> Result<(DataFrame, Vec<OutlierSummary>)> {
        let groups: Option<Vec<GroupKey>> = group_key.map(|name| group_keys(df, name)).transpose()?;
        let mut out = df.clone();
        let mut summaries = Vec::with_capacity(columns.len());

        for column in columns {
            let original_dtype = require_column(df, column)?.dtype().clone();
            let values = numeric_values(df, column)?;
            let outcome = detect_and_cap(&values, multiplier, groups.as_deref())?;

            let groups_affected = match &groups {
                Some(keys) => partition(keys)
                    .values()
                    .filter(|rows| rows.iter().any(|&r| outcome.mask.is_flagged(r)))
                    .count(),
                None => usize::from(outcome.outlier_count > 0),
            };

            if outcome.outlier_count > 0 {
                let series = values_to_series(column, &outcome.values, &original_dtype)
                    .context(format!("Rebuilding column '{}'", column))?;
                out.replace(column, series)?;
            }

            debug!(
                "Capped {} outliers in '{}' across {} group(s)",
                outcome.outlier_count, column, groups_affected
            );
            summaries.push(OutlierSummary {
                column: column.clone(),
                outliers_capped: outcome.outlier_count,
                groups_affected,
            });
        }

        Ok((out, summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_cap_columns_basic() {
        let df = df![
            "boardings" => [1.0, 2.0, 3.0, 4.0, 100.0],
        ]
        .unwrap();

        let (out, summaries) =
            OutlierHandler::cap_columns(&df, &names(&["boardings"]), None, 3.0).unwrap();

        let col: Vec<Option<f64>> = out.column("boardings").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(col, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]);
        assert_eq!(summaries[0].outliers_capped, 1);
        assert_eq!(summaries[0].groups_affected, 1);

        // input untouched
        let original = df.column("boardings").unwrap().f64().unwrap().get(4);
        assert_eq!(original, Some(100.0));
    }

    #[test]
    fn test_cap_columns_keeps_integer_dtype() {
        let df = df![
            "boardings" => [1i64, 2, 3, 4, 100],
        ]
        .unwrap();

        let (out, _) = OutlierHandler::cap_columns(&df, &names(&["boardings"]), None, 3.0).unwrap();
        let col = out.column("boardings").unwrap();
        assert_eq!(col.dtype(), &DataType::Int64);
        assert_eq!(col.i64().unwrap().get(4), Some(4));
    }

    #[test]
    fn test_cap_columns_per_group() {
        let df = df![
            "route" => ["606", "606", "606", "606", "606", "420", "420", "420", "420", "420"],
            "boardings" => [10.0, 11.0, 12.0, 13.0, 900.0, 100.0, 110.0, 120.0, 130.0, 140.0],
        ]
        .unwrap();

        let (out, summaries) =
            OutlierHandler::cap_columns(&df, &names(&["boardings"]), Some("route"), 3.0).unwrap();

        let col = out.column("boardings").unwrap().f64().unwrap();
        assert_eq!(col.get(4), Some(13.0));
        assert_eq!(col.get(9), Some(140.0));
        assert_eq!(summaries[0].outliers_capped, 1);
        assert_eq!(summaries[0].groups_affected, 1);
    }

    #[test]
    fn test_cap_columns_rejects_non_numeric() {
        let df = df![
            "boardings" => ["1", "2"],
        ]
        .unwrap();

        let err = OutlierHandler::cap_columns(&df, &names(&["boardings"]), None, 3.0).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    #[test]
    fn test_cap_columns_missing_group_column() {
        let df = df!["boardings" => [1.0]].unwrap();
        let err = OutlierHandler::cap_columns(&df, &names(&["boardings"]), Some("route"), 3.0)
            .unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_cap_columns_empty_frame() {
        let df = df!["boardings" => Vec::<f64>::new()].unwrap();
        let (out, summaries) =
            OutlierHandler::cap_columns(&df, &names(&["boardings"]), None, 3.0).unwrap();
        assert_eq!(out.height(), 0);
        assert_eq!(summaries[0].outliers_capped, 0);
        assert_eq!(summaries[0].groups_affected, 0);
    }
}
