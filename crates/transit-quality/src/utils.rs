//! Shared utilities for the data-quality engine.
//!
//! This module contains the helpers used across stages to move between
//! polars columns and the plain `Vec<Option<f64>>` columns the statistical
//! core works on.

use crate::error::{QualityError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

// =============================================================================
// Column Extraction
// =============================================================================

/// Look up a column, mapping the polars error to [`QualityError::ColumnNotFound`].
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| QualityError::ColumnNotFound(name.to_string()))
}

/// Extract a numeric column as `Option<f64>` values.
///
/// Nulls and NaNs both become `None`. A column whose dtype is not numeric is
/// rejected instead of being coerced. An all-null column (dtype `Null`) is
/// accepted as an all-missing numeric column.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    let dtype = column.dtype();

    if matches!(dtype, DataType::Null) {
        return Ok(vec![None; column.len()]);
    }
    if !is_numeric_dtype(dtype) {
        return Err(QualityError::not_numeric(name, dtype));
    }

    let cast = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Extract an integer key column as `Option<i64>` values.
pub fn integer_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = require_column(df, name)?;
    let dtype = column.dtype();

    if !is_integer_dtype(dtype) {
        return Err(QualityError::TypeConversionFailed {
            column: name.to_string(),
            target_type: "Int64".to_string(),
            reason: format!("key column has non-integer dtype {}", dtype),
        });
    }

    let cast = column.as_materialized_series().cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

/// Extract any column as string group keys (nulls stay `None`).
pub fn group_keys(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let cast = column.as_materialized_series().cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Build a Series from corrected values, restoring an integer dtype when every
/// present value is integral.
pub fn values_to_series(
    name: &str,
    values: &[Option<f64>],
    original_dtype: &DataType,
) -> PolarsResult<Series> {
    let series = Series::new(name.into(), values.to_vec());
    let integral = values.iter().flatten().all(|v| v.fract() == 0.0);

    if is_integer_dtype(original_dtype) && integral {
        series.cast(original_dtype)
    } else {
        Ok(series)
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Linear-interpolation quantile of an already sorted slice.
///
/// Position is `p * (n - 1)`; the result blends the two adjacent order
/// statistics. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let pos = p * (sorted.len() as f64 - 1.0);
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let a = sorted[idx];
    let b = sorted[(idx + 1).min(sorted.len() - 1)];
    Some(a + (b - a) * frac)
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Count missing entries in a column.
pub fn missing_count(values: &[Option<f64>]) -> usize {
    values.iter().filter(|v| v.is_none()).count()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_quantile_sorted_matches_linear_method() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile_sorted(&sorted, 0.25), Some(2.0));
        assert_eq!(quantile_sorted(&sorted, 0.75), Some(4.0));

        let even = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&even, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&even, 0.75), Some(3.25));
    }

    #[test]
    fn test_quantile_sorted_edge_cases() {
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[7.0], 0.25), Some(7.0));
        assert_eq!(quantile_sorted(&[7.0], 0.75), Some(7.0));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(2.005, 0), 2.0);
    }

    #[test]
    fn test_numeric_values_treats_nan_as_missing() {
        let df = df![
            "temperature" => [Some(1.0), None, Some(f64::NAN)],
        ]
        .unwrap();

        let values = numeric_values(&df, "temperature").unwrap();
        assert_eq!(values, vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_numeric_values_rejects_strings() {
        let df = df![
            "wind_speed" => ["calm", "5.0"],
        ]
        .unwrap();

        let err = numeric_values(&df, "wind_speed").unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
        assert!(err.to_string().contains("wind_speed"));
    }

    #[test]
    fn test_numeric_values_missing_column() {
        let df = df!["a" => [1.0]].unwrap();
        let err = numeric_values(&df, "b").unwrap_err();
        assert!(matches!(err, QualityError::ColumnNotFound(name) if name == "b"));
    }

    #[test]
    fn test_integer_values_rejects_floats() {
        let df = df!["hour" => [0.5, 1.0]].unwrap();
        assert!(integer_values(&df, "hour").is_err());

        let df = df!["hour" => [0i32, 23]].unwrap();
        assert_eq!(integer_values(&df, "hour").unwrap(), vec![Some(0), Some(23)]);
    }

    #[test]
    fn test_group_keys_from_integers() {
        let df = df!["route" => [606i64, 420]].unwrap();
        let keys = group_keys(&df, "route").unwrap();
        assert_eq!(keys, vec![Some("606".to_string()), Some("420".to_string())]);
    }

    #[test]
    fn test_values_to_series_restores_integer_dtype() {
        let series = values_to_series("boardings", &[Some(1.0), None, Some(4.0)], &DataType::Int64)
            .unwrap();
        assert_eq!(series.dtype(), &DataType::Int64);
        assert_eq!(series.null_count(), 1);

        let series = values_to_series("boardings", &[Some(1.5)], &DataType::Int64).unwrap();
        assert_eq!(series.dtype(), &DataType::Float64);
    }
}
