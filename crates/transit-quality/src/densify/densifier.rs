//! Sparse-to-dense reconstruction with a two-level fallback.

use super::keyspace::DimensionDomains;
use crate::config::{DensifyConfig, KeyColumns};
use crate::error::{QualityError, Result};
use crate::types::KeyTuple;
use crate::utils::{integer_values, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// One sparse observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: KeyTuple,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(key: KeyTuple, value: f64) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }
}

/// Where a dense cell's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Mean of the observations with exactly this key.
    Observed,
    /// Mean of all observations sharing (entity, tertiary).
    EntityTertiaryMean,
    /// The configured default.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DenseRow {
    pub key: KeyTuple,
    pub value: f64,
    pub source: ValueSource,
}

/// A table with exactly one row for every key of its declared domains,
/// sorted ascending by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseTable {
    domains: DimensionDomains,
    rows: Vec<DenseRow>,
}

impl DenseTable {
    pub fn rows(&self) -> &[DenseRow] {
        &self.rows
    }

    pub fn domains(&self) -> &DimensionDomains {
        &self.domains
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &KeyTuple) -> Option<&DenseRow> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Number of cells filled from each source.
    pub fn source_counts(&self) -> HashMap<ValueSource, usize> {
        let mut counts = HashMap::new();
        for row in &self.rows {
            *counts.entry(row.source).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_dataframe(&self, columns: &KeyColumns) -> PolarsResult<DataFrame> {
        let (mut entity, mut secondary, mut tertiary, mut value) = (
            Vec::with_capacity(self.len()),
            Vec::with_capacity(self.len()),
            Vec::with_capacity(self.len()),
            Vec::with_capacity(self.len()),
        );
        for row in &self.rows {
            entity.push(row.key.entity);
            secondary.push(row.key.secondary);
            tertiary.push(row.key.tertiary);
            value.push(row.value);
        }

        DataFrame::new(vec![
            Column::new(columns.entity.as_str().into(), entity),
            Column::new(columns.secondary.as_str().into(), secondary),
            Column::new(columns.tertiary.as_str().into(), tertiary),
            Column::new(columns.value.as_str().into(), value),
        ])
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Build the dense table over the cross product of `domains`.
///
/// Each cell takes, in order: the mean of exact-key observations, the mean of
/// every observation sharing its (entity, tertiary) pair regardless of the
/// secondary coordinate, or `default_value`. Missing observation values are
/// ignored at both levels.
pub fn densify(
    observations: &[Observation],
    domains: &DimensionDomains,
    default_value: f64,
) -> DenseTable {
    let mut exact: HashMap<KeyTuple, Mean> = HashMap::new();
    let mut reduced: HashMap<(i64, i64), Mean> = HashMap::new();

    for obs in observations {
        let Some(value) = obs.value.filter(|v| v.is_finite()) else {
            continue;
        };
        exact.entry(obs.key).or_default().add(value);
        reduced.entry(obs.key.entity_tertiary()).or_default().add(value);
    }

    let rows = domains
        .keys()
        .map(|key| {
            if let Some(value) = exact.get(&key).and_then(Mean::get) {
                DenseRow {
                    key,
                    value,
                    source: ValueSource::Observed,
                }
            } else if let Some(value) = reduced.get(&key.entity_tertiary()).and_then(Mean::get) {
                DenseRow {
                    key,
                    value,
                    source: ValueSource::EntityTertiaryMean,
                }
            } else {
                DenseRow {
                    key,
                    value: default_value,
                    source: ValueSource::Default,
                }
            }
        })
        .collect();

    DenseTable {
        domains: domains.clone(),
        rows,
    }
}

/// Densify a sparse observation table.
///
/// All declared key columns are checked before any work is done, so a
/// partial key space is never produced. Rows with a null key are skipped.
pub fn densify_frame(df: &DataFrame, config: &DensifyConfig) -> Result<DenseTable> {
    let columns = &config.columns;
    let missing: Vec<String> = columns
        .keys()
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(QualityError::MissingKeyColumns(missing));
    }

    let entities = integer_values(df, &columns.entity)?;
    let secondary = integer_values(df, &columns.secondary)?;
    let tertiary = integer_values(df, &columns.tertiary)?;
    let values = numeric_values(df, &columns.value)?;

    let mut observations = Vec::with_capacity(df.height());
    let mut skipped = 0;
    for (((entity, secondary), tertiary), value) in entities
        .iter()
        .zip(&secondary)
        .zip(&tertiary)
        .zip(&values)
    {
        match (entity, secondary, tertiary) {
            (Some(e), Some(s), Some(t)) => observations.push(Observation {
                key: KeyTuple::new(*e, *s, *t),
                value: *value,
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("Skipped {} observation rows with null keys", skipped);
    }

    let entity_domain: Vec<i64> = match &config.entities {
        Some(declared) => declared.clone(),
        None => observations
            .iter()
            .map(|obs| obs.key.entity)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let domains = DimensionDomains::new(
        entity_domain,
        config.secondary_domain.iter().copied(),
        config.tertiary_domain.iter().copied(),
    );
    Ok(densify(&observations, &domains, config.default_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(e: i64, s: i64, t: i64) -> KeyTuple {
        KeyTuple::new(e, s, t)
    }

    #[test]
    fn test_densify_falls_back_to_default() {
        let domains = DimensionDomains::new([1, 2], [0, 1], [0]);
        let observations = [
            Observation::new(key(1, 0, 0), 5.0),
            Observation::new(key(1, 1, 0), 9.0),
        ];

        let table = densify(&observations, &domains, 0.0);
        let rows: Vec<(KeyTuple, f64)> = table.rows().iter().map(|r| (r.key, r.value)).collect();
        assert_eq!(
            rows,
            vec![
                (key(1, 0, 0), 5.0),
                (key(1, 1, 0), 9.0),
                (key(2, 0, 0), 0.0),
                (key(2, 1, 0), 0.0),
            ]
        );
        assert_eq!(table.get(&key(2, 1, 0)).unwrap().source, ValueSource::Default);
    }

    #[test]
    fn test_entity_tertiary_mean_fallback() {
        let domains = DimensionDomains::new([1], [0, 1, 2], [8]);
        let observations = [
            Observation::new(key(1, 0, 8), 10.0),
            Observation::new(key(1, 1, 8), 20.0),
        ];

        let table = densify(&observations, &domains, 0.0);
        let cell = table.get(&key(1, 2, 8)).unwrap();
        assert_eq!(cell.value, 15.0);
        assert_eq!(cell.source, ValueSource::EntityTertiaryMean);
    }

    #[test]
    fn test_exact_observation_never_overridden() {
        let domains = DimensionDomains::new([1], [0, 1], [0]);
        let observations = [
            Observation::new(key(1, 0, 0), 1.0),
            Observation::new(key(1, 1, 0), 100.0),
        ];
        let table = densify(&observations, &domains, -1.0);
        assert_eq!(table.get(&key(1, 0, 0)).unwrap().value, 1.0);
        assert_eq!(table.get(&key(1, 1, 0)).unwrap().value, 100.0);
        assert_eq!(table.source_counts()[&ValueSource::Observed], 2);
    }

    #[test]
    fn test_duplicate_exact_keys_are_averaged() {
        let domains = DimensionDomains::new([1], [0], [0]);
        let observations = [
            Observation::new(key(1, 0, 0), 2.0),
            Observation::new(key(1, 0, 0), 4.0),
        ];
        let table = densify(&observations, &domains, 0.0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].value, 3.0);
    }

    #[test]
    fn test_null_observation_falls_through() {
        let domains = DimensionDomains::new([1], [0, 1], [0]);
        let observations = [
            Observation {
                key: key(1, 0, 0),
                value: None,
            },
            Observation::new(key(1, 1, 0), 6.0),
        ];
        let table = densify(&observations, &domains, 0.0);
        let cell = table.get(&key(1, 0, 0)).unwrap();
        assert_eq!(cell.value, 6.0);
        assert_eq!(cell.source, ValueSource::EntityTertiaryMean);
    }

    #[test]
    fn test_observations_outside_domain_still_feed_fallback() {
        let domains = DimensionDomains::new([1], [0], [0]);
        let observations = [Observation::new(key(1, 9, 0), 7.0)];
        let table = densify(&observations, &domains, 0.0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].value, 7.0);
    }

    #[test]
    fn test_completeness_with_empty_observations() {
        let domains = DimensionDomains::new([1, 2, 3], [0, 1, 2, 3, 4, 5, 6], 0..24);
        let table = densify(&[], &domains, 0.0);
        assert_eq!(table.len(), 3 * 7 * 24);
        assert!(table.rows().iter().all(|r| r.source == ValueSource::Default));
        assert!(table.rows().windows(2).all(|w| w[0].key < w[1].key));
    }

    fn small_config() -> DensifyConfig {
        DensifyConfig {
            columns: KeyColumns {
                entity: "stop".to_string(),
                secondary: "dow".to_string(),
                tertiary: "hour".to_string(),
                value: "load".to_string(),
            },
            default_value: 0.0,
            entities: None,
            secondary_domain: vec![0, 1],
            tertiary_domain: vec![0],
        }
    }

    #[test]
    fn test_densify_frame_uses_observed_entities() {
        let df = df![
            "stop" => [2i64, 1, 2],
            "dow" => [0i64, 1, 1],
            "hour" => [0i64, 0, 0],
            "load" => [3.0, 4.0, 5.0],
        ]
        .unwrap();

        let table = densify_frame(&df, &small_config()).unwrap();
        assert_eq!(table.domains().entities(), &[1, 2]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(&key(1, 0, 0)).unwrap().value, 4.0);
        assert_eq!(table.get(&key(2, 1, 0)).unwrap().value, 5.0);

        let out = table.to_dataframe(&small_config().columns).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(out.get_column_names().len(), 4);
    }

    #[test]
    fn test_densify_frame_declared_entities() {
        let df = df![
            "stop" => [1i64],
            "dow" => [0i64],
            "hour" => [0i64],
            "load" => [3.0],
        ]
        .unwrap();
        let config = DensifyConfig {
            entities: Some(vec![1, 2, 3]),
            ..small_config()
        };
        let table = densify_frame(&df, &config).unwrap();
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_densify_frame_missing_keys_fail_fast() {
        let df = df![
            "stop" => [1i64],
            "load" => [3.0],
        ]
        .unwrap();

        let err = densify_frame(&df, &small_config()).unwrap_err();
        match err {
            QualityError::MissingKeyColumns(missing) => {
                assert_eq!(missing, vec!["dow".to_string(), "hour".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_densify_frame_non_numeric_value() {
        let df = df![
            "stop" => [1i64],
            "dow" => [0i64],
            "hour" => [0i64],
            "load" => ["many"],
        ]
        .unwrap();
        let err = densify_frame(&df, &small_config()).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }
}
