//! Dataset descriptions and the built-in presets.
//!
//! A [`DatasetSpec`] says which columns of a table are capped, which are
//! imputed and how, and what tidy-up happens afterwards. The presets cover
//! the three tables of the ridership batch: hourly boardings, daily
//! boardings and hourly weather observations.

use crate::error::{QualityError, Result};
use crate::imputers::{FieldRule, ImputationRule, ValidRange};
use crate::utils::require_column;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column name markers used by the boarding tables.
pub mod columns {
    pub const BOARDING_TOTAL: &str = "승차총승객수";
    pub const ALIGHTING_TOTAL: &str = "하차총승객수";
    pub const ROUTE_NUMBER: &str = "노선번호";
    pub const USAGE_DATE: &str = "사용일자";
    pub const REGISTERED_DATE: &str = "등록일자";
    pub const TRANSPORT_TYPE_CODE: &str = "교통수단타입코드";
    pub const TRANSPORT_TYPE_NAME: &str = "교통수단타입명";
    pub const STOP_SEQUENCE: &str = "정류장순번";
    pub const STOP_NAME: &str = "정류장명";
}

/// Selects columns of a table by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "values", rename_all = "snake_case")]
pub enum ColumnSelector {
    /// Exactly these columns; each must exist.
    Named(Vec<String>),
    /// Every column whose name contains any of the markers, in table order.
    Containing(Vec<String>),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self::Named(Vec::new())
    }
}

impl ColumnSelector {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(names.into_iter().map(Into::into).collect())
    }

    pub fn containing<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Containing(markers.into_iter().map(Into::into).collect())
    }

    pub fn resolve(&self, df: &DataFrame) -> Result<Vec<String>> {
        match self {
            Self::Named(names) => {
                for name in names {
                    require_column(df, name)?;
                }
                Ok(names.clone())
            }
            Self::Containing(markers) => Ok(df
                .get_column_names()
                .into_iter()
                .filter(|name| markers.iter().any(|m| name.contains(m.as_str())))
                .map(|name| name.to_string())
                .collect()),
        }
    }
}

/// An imputation rule applied to every column a selector resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRule {
    pub columns: ColumnSelector,
    pub rule: ImputationRule,
}

impl SelectorRule {
    pub fn new(columns: ColumnSelector, rule: ImputationRule) -> Self {
        Self { columns, rule }
    }
}

/// Target type of a parsed temporal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    #[default]
    Date,
    /// Millisecond precision, no time zone.
    Datetime,
}

/// A text or integer column parsed into a polars temporal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    pub name: String,
    /// chrono format string, e.g. `%Y%m%d`.
    pub format: String,
    #[serde(default)]
    pub kind: TemporalKind,
}

impl DateColumn {
    pub fn date(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            kind: TemporalKind::Date,
        }
    }

    pub fn datetime(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            kind: TemporalKind::Datetime,
        }
    }

    /// Parse the column, returning the converted Series.
    ///
    /// Nulls stay null; any other value that does not match the format is an
    /// error.
    pub fn parse(&self, df: &DataFrame) -> Result<Series> {
        let column = require_column(df, &self.name)?;
        let text = column.as_materialized_series().cast(&DataType::String)?;
        let epoch = DateTime::<Utc>::UNIX_EPOCH.naive_utc();

        let mut parsed: Vec<Option<i64>> = Vec::with_capacity(text.len());
        for value in text.str()?.into_iter() {
            let Some(raw) = value.map(str::trim) else {
                parsed.push(None);
                continue;
            };
            let result = match self.kind {
                TemporalKind::Date => NaiveDate::parse_from_str(raw, &self.format)
                    .map(|d| d.signed_duration_since(epoch.date()).num_days()),
                TemporalKind::Datetime => NaiveDateTime::parse_from_str(raw, &self.format)
                    .map(|dt| dt.and_utc().timestamp_millis()),
            };
            let value = result.map_err(|e| QualityError::TypeConversionFailed {
                column: self.name.clone(),
                target_type: format!("{:?}", self.kind),
                reason: format!("'{}' does not match '{}': {}", raw, self.format, e),
            })?;
            parsed.push(Some(value));
        }

        let name: PlSmallStr = self.name.as_str().into();
        let series = match self.kind {
            TemporalKind::Date => {
                let days: Vec<Option<i32>> = parsed
                    .into_iter()
                    .map(|d| d.and_then(|d| i32::try_from(d).ok()))
                    .collect();
                Series::new(name, days).cast(&DataType::Date)?
            }
            TemporalKind::Datetime => Series::new(name, parsed)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        };
        Ok(series)
    }
}

/// How one table is corrected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSpec {
    /// Label used in logs and reports.
    pub name: String,

    /// `(source, target)` pairs. When non-empty only these columns are kept,
    /// renamed to their targets.
    pub select: Vec<(String, String)>,

    /// Columns that receive IQR capping.
    pub outlier_columns: ColumnSelector,

    /// Partition column for per-group capping.
    pub group_key: Option<String>,

    /// Imputation rules; columns are resolved after selection.
    pub imputation: Vec<SelectorRule>,

    /// Numeric column giving the interpolation order. Row order otherwise.
    pub order_by: Option<String>,

    /// Temporal column parsed after imputation.
    pub date_column: Option<DateColumn>,

    /// Removed from the output when present.
    pub drop_columns: Vec<String>,
}

impl DatasetSpec {
    /// Hourly boardings: every boarding/alighting total column is capped
    /// column-wise and missing counts become zero.
    pub fn hourly_boarding() -> Self {
        let counts = ColumnSelector::containing([columns::BOARDING_TOTAL, columns::ALIGHTING_TOTAL]);
        Self {
            name: "hourly_boarding".to_string(),
            outlier_columns: counts.clone(),
            imputation: vec![SelectorRule::new(counts, ImputationRule::Constant { value: 0.0 })],
            drop_columns: vec![
                columns::TRANSPORT_TYPE_CODE.to_string(),
                columns::TRANSPORT_TYPE_NAME.to_string(),
                columns::REGISTERED_DATE.to_string(),
            ],
            ..Default::default()
        }
    }

    /// Daily boardings: totals capped per route, usage date parsed.
    pub fn daily_boarding() -> Self {
        let counts = ColumnSelector::named([columns::BOARDING_TOTAL, columns::ALIGHTING_TOTAL]);
        Self {
            name: "daily_boarding".to_string(),
            outlier_columns: counts.clone(),
            group_key: Some(columns::ROUTE_NUMBER.to_string()),
            imputation: vec![SelectorRule::new(counts, ImputationRule::Constant { value: 0.0 })],
            date_column: Some(DateColumn::date(columns::USAGE_DATE, "%Y%m%d")),
            drop_columns: vec![columns::REGISTERED_DATE.to_string()],
            ..Default::default()
        }
    }

    /// Hourly weather: zero-filled precipitation and snow, interpolated
    /// temperature and wind speed with physical range checks.
    pub fn weather() -> Self {
        let select = [
            ("일시", "datetime"),
            ("기온(°C)", "temperature"),
            ("강수량(mm)", "precipitation"),
            ("풍속(m/s)", "wind_speed"),
            ("적설(cm)", "snow"),
        ];
        let for_field =
            |field: &str, rule| SelectorRule::new(ColumnSelector::named([field]), rule);

        Self {
            name: "weather".to_string(),
            select: select
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            imputation: vec![
                for_field("precipitation", ImputationRule::Constant { value: 0.0 }),
                for_field("snow", ImputationRule::Constant { value: 0.0 }),
                for_field("temperature", ImputationRule::Interpolate),
                for_field("wind_speed", ImputationRule::Interpolate),
                for_field(
                    "temperature",
                    ImputationRule::RangeInvalidate(ValidRange::between(-20.0, 40.0)),
                ),
                for_field(
                    "wind_speed",
                    ImputationRule::RangeInvalidate(ValidRange::at_most(30.0)),
                ),
            ],
            date_column: Some(DateColumn::datetime("datetime", "%Y-%m-%d %H:%M")),
            ..Default::default()
        }
    }

    /// Apply column selection and renaming.
    pub fn select_columns(&self, df: &DataFrame) -> Result<DataFrame> {
        if self.select.is_empty() {
            return Ok(df.clone());
        }
        for (source, _) in &self.select {
            require_column(df, source)?;
        }

        let mut out = df.select(self.select.iter().map(|(source, _)| source.as_str()))?;
        for (source, target) in &self.select {
            if source != target {
                out.rename(source, target.as_str().into())?;
            }
        }
        Ok(out)
    }

    /// Expand the selector rules into per-field rules against `df`.
    pub fn field_rules(&self, df: &DataFrame) -> Result<Vec<FieldRule>> {
        let mut rules = Vec::new();
        for selector_rule in &self.imputation {
            for field in selector_rule.columns.resolve(df)? {
                rules.push(FieldRule::new(field, selector_rule.rule));
            }
        }
        Ok(rules)
    }
}
