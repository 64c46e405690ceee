//! The ordered imputation cascade.
//!
//! Rules bound to a field always run in priority order:
//! constant substitution, then linear interpolation, then range
//! invalidation followed by re-interpolation.

use super::strategies::{ValidRange, fill_constant, interpolate_linear, invalidate_out_of_range};
use crate::error::{QualityError, Result, ResultExt};
use crate::utils::{missing_count, numeric_values, require_column, values_to_series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A named imputation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ImputationRule {
    /// Missing means a known baseline (e.g. no precipitation).
    Constant { value: f64 },
    /// Fill gaps from the nearest present neighbors.
    Interpolate,
    /// Values outside the domain become missing, then get re-interpolated.
    RangeInvalidate(ValidRange),
}

impl ImputationRule {
    /// Execution priority; lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Constant { .. } => 1,
            Self::Interpolate => 2,
            Self::RangeInvalidate(_) => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "constant",
            Self::Interpolate => "interpolate",
            Self::RangeInvalidate(_) => "range_invalidate",
        }
    }
}

/// An imputation rule bound to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub rule: ImputationRule,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, rule: ImputationRule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }

    pub fn constant(field: impl Into<String>, value: f64) -> Self {
        Self::new(field, ImputationRule::Constant { value })
    }

    pub fn interpolate(field: impl Into<String>) -> Self {
        Self::new(field, ImputationRule::Interpolate)
    }

    pub fn range(field: impl Into<String>, range: ValidRange) -> Self {
        Self::new(field, ImputationRule::RangeInvalidate(range))
    }
}

/// Final state of a field after the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Nothing needed filling.
    Untouched,
    /// Every missing value was filled.
    Filled,
    /// Missing values remain because there was nothing to interpolate from.
    Unresolved,
}

/// What the cascade did to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field: String,
    pub missing_before: usize,
    pub constant_filled: usize,
    pub interpolated: usize,
    pub invalidated: usize,
    pub remaining_missing: usize,
    pub status: FieldStatus,
}

/// Corrected columns plus one report per field that had rules.
#[derive(Debug, Clone, Default)]
pub struct ImputedFields {
    pub fields: BTreeMap<String, Vec<Option<f64>>>,
    pub reports: Vec<FieldReport>,
}

impl ImputedFields {
    pub fn unresolved(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.status == FieldStatus::Unresolved)
            .map(|r| r.field.as_str())
            .collect()
    }
}

/// Run the cascade over a set of fields.
///
/// Fields without rules are passed through unchanged. A rule that names a
/// field absent from `series_by_field` is an error.
pub fn impute(
    series_by_field: &BTreeMap<String, Vec<Option<f64>>>,
    rules: &[FieldRule],
    order_index: Option<&[f64]>,
) -> Result<ImputedFields> {
    let mut result = ImputedFields {
        fields: series_by_field.clone(),
        reports: Vec::new(),
    };

    for (field, field_rules) in group_rules(rules) {
        let values = series_by_field
            .get(field)
            .ok_or_else(|| QualityError::ColumnNotFound(field.to_string()))?;

        if let Some(index) = order_index
            && index.len() != values.len()
        {
            return Err(QualityError::LengthMismatch {
                field: "order_index".to_string(),
                expected: values.len(),
                actual: index.len(),
            });
        }

        let (corrected, report) = run_cascade(field, values, &field_rules, order_index)?;
        if report.status == FieldStatus::Unresolved {
            warn!(
                "Field '{}' left with {} unresolved missing values",
                field, report.remaining_missing
            );
        } else {
            debug!(
                "Imputed '{}': {} constant, {} interpolated, {} invalidated",
                field, report.constant_filled, report.interpolated, report.invalidated
            );
        }

        result.fields.insert(field.to_string(), corrected);
        result.reports.push(report);
    }

    Ok(result)
}

/// Rules grouped per field, each group sorted by priority.
fn group_rules(rules: &[FieldRule]) -> BTreeMap<&str, Vec<ImputationRule>> {
    let mut grouped: BTreeMap<&str, Vec<ImputationRule>> = BTreeMap::new();
    for rule in rules {
        grouped.entry(rule.field.as_str()).or_default().push(rule.rule);
    }
    for field_rules in grouped.values_mut() {
        field_rules.sort_by_key(ImputationRule::priority);
    }
    grouped
}

fn run_cascade(
    field: &str,
    values: &[Option<f64>],
    rules: &[ImputationRule],
    order_index: Option<&[f64]>,
) -> Result<(Vec<Option<f64>>, FieldReport)> {
    let missing_before = missing_count(values);
    let mut current = values.to_vec();
    let mut constant_filled = 0;
    let mut interpolated = 0;
    let mut invalidated = 0;

    for rule in rules {
        match rule {
            ImputationRule::Constant { value } => {
                let (next, n) = fill_constant(&current, *value);
                current = next;
                constant_filled += n;
            }
            ImputationRule::Interpolate => {
                let (next, n) = interpolate_linear(&current, order_index)?;
                current = next;
                interpolated += n;
            }
            ImputationRule::RangeInvalidate(range) => {
                let (cleared, n) = invalidate_out_of_range(&current, *range);
                let (next, filled) = interpolate_linear(&cleared, order_index)?;
                current = next;
                invalidated += n;
                interpolated += filled;
            }
        }
    }

    let remaining_missing = missing_count(&current);
    let status = if remaining_missing > 0 {
        FieldStatus::Unresolved
    } else if constant_filled + interpolated + invalidated > 0 {
        FieldStatus::Filled
    } else {
        FieldStatus::Untouched
    };

    let report = FieldReport {
        field: field.to_string(),
        missing_before,
        constant_filled,
        interpolated,
        invalidated,
        remaining_missing,
        status,
    };
    Ok((current, report))
}

/// Applies imputation rules to DataFrame columns.
pub struct Imputer;

impl Imputer {
    /// Impute the columns named by `rules`, returning a new DataFrame.
    ///
    /// `order_by` names a numeric column used as the interpolation order
    /// index; without it, row order is used.
    pub fn apply_to_frame(
        df: &DataFrame,
        rules: &[FieldRule],
        order_by: Option<&str>,
    ) -> Result<(DataFrame, Vec<FieldReport>)> {
        let mut series_by_field = BTreeMap::new();
        for rule in rules {
            if !series_by_field.contains_key(&rule.field) {
                series_by_field.insert(rule.field.clone(), numeric_values(df, &rule.field)?);
            }
        }

        let order_index = order_by
            .map(|name| Self::order_index(df, name))
            .transpose()?;

        let imputed = impute(&series_by_field, rules, order_index.as_deref())?;

        let mut out = df.clone();
        for report in &imputed.reports {
            if report.status == FieldStatus::Untouched {
                continue;
            }
            let original_dtype = require_column(df, &report.field)?.dtype().clone();
            let values = &imputed.fields[&report.field];
            let series = values_to_series(&report.field, values, &original_dtype)
                .context(format!("Rebuilding column '{}'", report.field))?;
            out.replace(&report.field, series)?;
        }

        Ok((out, imputed.reports))
    }

    fn order_index(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
        numeric_values(df, name)?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    QualityError::InvalidConfig(format!(
                        "order column '{}' contains missing values",
                        name
                    ))
                })
            })
            .collect()
    }
}
