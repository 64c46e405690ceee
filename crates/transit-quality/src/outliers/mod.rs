//! Outlier detection and capping.
//!
//! - [`OutlierDetector`] computes the IQR upper bound from positive values
//! - [`Capper`] replaces flagged values with the largest retained value
//! - [`detect_and_cap`] runs both, optionally isolated per group
//! - [`OutlierHandler`] applies them to DataFrame columns

mod capper;
mod detector;
mod handler;

pub use capper::{CapOutcome, Capper};
pub use detector::{IqrBounds, OutlierDetector};
pub use handler::OutlierHandler;

use crate::error::{QualityError, Result};
use crate::types::{GroupKey, OutlierMask};
use std::collections::BTreeMap;

/// Detect and cap outliers in one series.
///
/// When `groups` is supplied, bounds and caps are computed independently per
/// partition, so an outlier in one group never moves the bound of another.
pub fn detect_and_cap(
    values: &[Option<f64>],
    multiplier: f64,
    groups: Option<&[GroupKey]>,
) -> Result<CapOutcome> {
    let detector = OutlierDetector::new(multiplier);

    let Some(groups) = groups else {
        return Ok(Capper::cap(values, detector.detect(values)));
    };

    if groups.len() != values.len() {
        return Err(QualityError::LengthMismatch {
            field: "group_key".to_string(),
            expected: values.len(),
            actual: groups.len(),
        });
    }

    let mut corrected = values.to_vec();
    let mut mask = OutlierMask::clear(values.len());
    let mut outlier_count = 0;

    for indices in partition(groups).values() {
        let group_values: Vec<Option<f64>> = indices.iter().map(|&i| values[i]).collect();
        let outcome = Capper::cap(&group_values, detector.detect(&group_values));
        if outcome.outlier_count == 0 {
            continue;
        }

        outlier_count += outcome.outlier_count;
        for (local, &row) in indices.iter().enumerate() {
            corrected[row] = outcome.values[local];
            if outcome.mask.is_flagged(local) {
                mask.set(row);
            }
        }
    }

    Ok(CapOutcome {
        values: corrected,
        mask,
        outlier_count,
    })
}

/// Row indices per group, in first-seen row order within each group.
pub(crate) fn partition(groups: &[GroupKey]) -> BTreeMap<&GroupKey, Vec<usize>> {
    let mut parts: BTreeMap<&GroupKey, Vec<usize>> = BTreeMap::new();
    for (row, key) in groups.iter().enumerate() {
        parts.entry(key).or_default().push(row);
    }
    parts
}
