use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::imputers::FieldReport;

/// Partition key for per-group outlier isolation. `None` is the null group.
pub type GroupKey = Option<String>;

/// Boolean sequence aligned 1:1 with a series; `true` marks an outlier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierMask(Vec<bool>);

impl OutlierMask {
    pub fn new(flags: Vec<bool>) -> Self {
        Self(flags)
    }

    /// A mask of the given length with nothing flagged.
    pub fn clear(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|flag| **flag).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub(crate) fn set(&mut self, index: usize) {
        self.0[index] = true;
    }
}

/// One cell coordinate of a dense table: (entity id, secondary, tertiary).
///
/// For the prediction lookup the secondary coordinate is the day of week
/// (0-6) and the tertiary coordinate the hour of day (0-23). Ordering is
/// lexicographic over the three coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyTuple {
    pub entity: i64,
    pub secondary: i64,
    pub tertiary: i64,
}

impl KeyTuple {
    pub fn new(entity: i64, secondary: i64, tertiary: i64) -> Self {
        Self {
            entity,
            secondary,
            tertiary,
        }
    }

    /// The reduced key used by the first fallback level.
    pub fn entity_tertiary(&self) -> (i64, i64) {
        (self.entity, self.tertiary)
    }
}

/// Outliers capped in one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub column: String,
    pub outliers_capped: usize,
    /// Number of group partitions in which at least one value was capped.
    pub groups_affected: usize,
}

/// Summary of one `Pipeline::clean` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub dataset: String,
    pub rows: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub outliers: Vec<OutlierSummary>,
    pub fields: Vec<FieldReport>,
    pub unresolved_fields: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub duration_ms: u64,
}

impl CleaningSummary {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    pub fn total_outliers(&self) -> usize {
        self.outliers.iter().map(|o| o.outliers_capped).sum()
    }

    /// Missing values that were filled, per field.
    pub fn filled_by_field(&self) -> BTreeMap<String, usize> {
        self.fields
            .iter()
            .map(|f| (f.field.clone(), f.constant_filled + f.interpolated))
            .collect()
    }
}
