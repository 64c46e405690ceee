//! Route filtering for the raw monthly ridership exports.
//!
//! The city exports cover every route in one file per month. The batch keeps
//! only the target routes and stacks the months into one table, which is the
//! input the `hourly_boarding` and `daily_boarding` presets expect.

use crate::error::{QualityError, Result, ResultExt};
use crate::utils::require_column;
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Keep the rows whose route is one of `routes`.
///
/// The route column is compared as text, so an integer column `420` matches
/// the route `"420"`. The returned table carries the route column as
/// `String`; rows with a null route are dropped.
pub fn filter_routes(df: &DataFrame, route_column: &str, routes: &[String]) -> Result<DataFrame> {
    let column = require_column(df, route_column)?;
    let as_text = column.as_materialized_series().cast(&DataType::String)?;
    let wanted: HashSet<&str> = routes.iter().map(String::as_str).collect();

    let mask_values: Vec<bool> = as_text
        .str()?
        .into_iter()
        .map(|route| route.is_some_and(|r| wanted.contains(r)))
        .collect();
    let mask = BooleanChunked::from_slice("mask".into(), &mask_values);

    let mut out = df.clone();
    out.replace(route_column, as_text)?;
    let filtered = out.filter(&mask)?;

    debug!(
        "Kept {} of {} rows for routes [{}]",
        filtered.height(),
        df.height(),
        routes.join(", ")
    );
    Ok(filtered)
}

/// Stack tables with the same columns, in order.
///
/// Columns are matched by name; a column whose dtype differs from the first
/// table's is cast to it. An empty input yields an empty table.
pub fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut frames = frames.into_iter();
    let Some(mut out) = frames.next() else {
        return Ok(DataFrame::empty());
    };

    for (i, frame) in frames.enumerate() {
        let aligned = align_columns(&out, &frame).context(format!("Stacking table {}", i + 2))?;
        out.vstack_mut(&aligned)?;
    }
    Ok(out)
}

/// Row count per route value, read as text.
pub fn count_by_route(df: &DataFrame, route_column: &str) -> Result<BTreeMap<String, usize>> {
    let column = require_column(df, route_column)?;
    let as_text = column.as_materialized_series().cast(&DataType::String)?;

    let mut counts = BTreeMap::new();
    for route in as_text.str()?.into_iter().flatten() {
        *counts.entry(route.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

fn align_columns(target: &DataFrame, frame: &DataFrame) -> Result<DataFrame> {
    let expected: Vec<&str> = target.get_column_names().into_iter().map(|n| n.as_str()).collect();
    let actual: Vec<&str> = frame.get_column_names().into_iter().map(|n| n.as_str()).collect();
    if expected != actual {
        return Err(QualityError::SchemaMismatch(format!(
            "expected columns [{}], got [{}]",
            expected.join(", "),
            actual.join(", ")
        )));
    }

    let columns = target
        .get_columns()
        .iter()
        .zip(frame.get_columns())
        .map(|(want, have)| {
            if want.dtype() == have.dtype() {
                Ok(have.clone())
            } else {
                have.cast(want.dtype())
            }
        })
        .collect::<PolarsResult<Vec<Column>>>()?;
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(names: &[&str]) -> Vec<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_filter_integer_route_column() {
        let df = df![
            "노선번호" => [420i64, 143, 606, 420],
            "승차총승객수" => [10i64, 20, 30, 40],
        ]
        .unwrap();

        let out = filter_routes(&df, "노선번호", &routes(&["606", "420"])).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(out.column("노선번호").unwrap().dtype(), &DataType::String);

        let kept: Vec<Option<i64>> = out
            .column("승차총승객수")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(kept, vec![Some(10), Some(30), Some(40)]);
    }

    #[test]
    fn test_filter_string_route_column() {
        let df = df![
            "노선번호" => [Some("420"), Some("N62"), None, Some("606")],
        ]
        .unwrap();

        let out = filter_routes(&df, "노선번호", &routes(&["606", "420"])).unwrap();
        let kept: Vec<Option<&str>> = out.column("노선번호").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(kept, vec![Some("420"), Some("606")]);
    }

    #[test]
    fn test_filter_missing_route_column() {
        let df = df!["route" => [420i64]].unwrap();
        let err = filter_routes(&df, "노선번호", &routes(&["420"])).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_filter_no_matching_routes() {
        let df = df!["노선번호" => [143i64, 7016]].unwrap();
        let out = filter_routes(&df, "노선번호", &routes(&["420"])).unwrap();
        assert_eq!(out.height(), 0);
        assert_eq!(out.width(), 1);
    }

    #[test]
    fn test_concat_frames_casts_to_first_schema() {
        let january = df![
            "노선번호" => ["420"],
            "하차총승객수" => [5.0],
        ]
        .unwrap();
        let february = df![
            "노선번호" => ["606"],
            "하차총승객수" => [7i64],
        ]
        .unwrap();

        let out = concat_frames(vec![january, february]).unwrap();
        assert_eq!(out.height(), 2);
        let values: Vec<Option<f64>> = out
            .column("하차총승객수")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(5.0), Some(7.0)]);
    }

    #[test]
    fn test_concat_frames_rejects_different_columns() {
        let a = df!["노선번호" => ["420"]].unwrap();
        let b = df!["route" => ["420"]].unwrap();
        let err = concat_frames(vec![a, b]).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
    }

    #[test]
    fn test_concat_frames_empty() {
        let out = concat_frames(Vec::new()).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_count_by_route() {
        let df = df!["노선번호" => [420i64, 606, 420]].unwrap();
        let counts = count_by_route(&df, "노선번호").unwrap();
        assert_eq!(counts["420"], 2);
        assert_eq!(counts["606"], 1);
    }
}
