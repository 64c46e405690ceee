//! Column-level imputation strategies.
//!
//! Every function takes a column and returns a new one together with the
//! number of entries it changed.

use crate::error::{QualityError, Result};
use serde::{Deserialize, Serialize};

/// Inclusive physically valid domain of a field. A missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ValidRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Replace every missing value with `constant`.
pub fn fill_constant(values: &[Option<f64>], constant: f64) -> (Vec<Option<f64>>, usize) {
    let filled = values.iter().filter(|v| v.is_none()).count();
    (
        values.iter().map(|v| Some(v.unwrap_or(constant))).collect(),
        filled,
    )
}

/// Turn values outside `range` into missing values.
pub fn invalidate_out_of_range(
    values: &[Option<f64>],
    range: ValidRange,
) -> (Vec<Option<f64>>, usize) {
    let mut invalidated = 0;
    let out = values
        .iter()
        .map(|v| match v {
            Some(x) if !range.contains(*x) => {
                invalidated += 1;
                None
            }
            other => *other,
        })
        .collect();
    (out, invalidated)
}

/// Fill missing values by linear interpolation between the nearest present
/// neighbors along `order_index` (row position when `None`).
///
/// A gap with an anchor on one side only takes that anchor's value. With no
/// anchors at all nothing can be filled and the column is returned as is.
///
/// # Errors
///
/// Returns [`QualityError::LengthMismatch`] when `order_index` and `values`
/// differ in length.
pub fn interpolate_linear(
    values: &[Option<f64>],
    order_index: Option<&[f64]>,
) -> Result<(Vec<Option<f64>>, usize)> {
    if let Some(idx) = order_index
        && idx.len() != values.len()
    {
        return Err(QualityError::LengthMismatch {
            field: "order_index".to_string(),
            expected: values.len(),
            actual: idx.len(),
        });
    }

    let position = |row: usize| order_index.map_or(row as f64, |idx| idx[row]);

    let mut order: Vec<usize> = (0..values.len()).collect();
    if let Some(idx) = order_index {
        order.sort_by(|&a, &b| idx[a].total_cmp(&idx[b]));
    }

    let anchors: Vec<usize> = order.iter().copied().filter(|&row| values[row].is_some()).collect();
    let mut out = values.to_vec();
    if anchors.is_empty() {
        return Ok((out, 0));
    }

    let mut filled = 0;
    // index into `anchors` of the next anchor at or after the current position
    let mut next: usize = 0;
    for &row in &order {
        if values[row].is_some() {
            next += 1;
            continue;
        }

        let before = next.checked_sub(1).map(|i| anchors[i]);
        let after = anchors.get(next).copied();

        let value = match (before, after) {
            (Some(a), Some(b)) => {
                let (xa, xb) = (position(a), position(b));
                let (ya, yb) = (values[a].unwrap_or_default(), values[b].unwrap_or_default());
                if xb == xa {
                    ya
                } else {
                    ya + (yb - ya) * (position(row) - xa) / (xb - xa)
                }
            }
            (Some(a), None) => values[a].unwrap_or_default(),
            (None, Some(b)) => values[b].unwrap_or_default(),
            (None, None) => continue,
        };

        out[row] = Some(value);
        filled += 1;
    }

    Ok((out, filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_constant() {
        let (out, filled) = fill_constant(&[None, Some(0.4), None], 0.0);
        assert_eq!(out, vec![Some(0.0), Some(0.4), Some(0.0)]);
        assert_eq!(filled, 2);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let (out, filled) = interpolate_linear(&[Some(10.0), None, Some(20.0)], None).unwrap();
        assert_eq!(out, vec![Some(10.0), Some(15.0), Some(20.0)]);
        assert_eq!(filled, 1);
    }

    #[test]
    fn test_adjacent_gaps_share_outer_anchors() {
        let (out, _) = interpolate_linear(&[Some(0.0), None, None, Some(3.0)], None).unwrap();
        assert_eq!(out, vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_boundary_gaps_take_nearest_anchor() {
        let (out, filled) = interpolate_linear(&[None, Some(4.0), None, Some(8.0), None], None).unwrap();
        assert_eq!(out, vec![Some(4.0), Some(4.0), Some(6.0), Some(8.0), Some(8.0)]);
        assert_eq!(filled, 3);
    }

    #[test]
    fn test_no_anchors_leaves_missing() {
        let (out, filled) = interpolate_linear(&[None, None], None).unwrap();
        assert_eq!(out, vec![None, None]);
        assert_eq!(filled, 0);
    }

    #[test]
    fn test_interpolate_follows_order_index() {
        // Rows arrive out of order; index gives hours 0, 3, 1.
        let values = [Some(0.0), Some(30.0), None];
        let index = [0.0, 3.0, 1.0];
        let (out, _) = interpolate_linear(&values, Some(&index)).unwrap();
        assert_eq!(out, vec![Some(0.0), Some(30.0), Some(10.0)]);
    }

    #[test]
    fn test_interpolate_uses_index_spacing() {
        let values = [Some(0.0), None, Some(10.0)];
        let index = [0.0, 8.0, 10.0];
        let (out, _) = interpolate_linear(&values, Some(&index)).unwrap();
        assert_eq!(out[1], Some(8.0));
    }

    #[test]
    fn test_interpolate_rejects_short_order_index() {
        let values = [Some(1.0), None, Some(3.0)];
        let index = [0.0, 1.0];
        let err = interpolate_linear(&values, Some(&index)).unwrap_err();
        assert_eq!(err.error_code(), "LENGTH_MISMATCH");
    }

    #[test]
    fn test_invalidate_out_of_range() {
        let (out, n) = invalidate_out_of_range(&[Some(5.0), Some(45.0), Some(7.0), None], ValidRange::at_most(30.0));
        assert_eq!(out, vec![Some(5.0), None, Some(7.0), None]);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_valid_range_contains_bounds() {
        let range = ValidRange::between(-20.0, 40.0);
        assert!(range.contains(-20.0));
        assert!(range.contains(40.0));
        assert!(!range.contains(40.1));
        assert!(!range.contains(-25.0));
        assert!(ValidRange::at_least(0.0).contains(1e9));
        assert!(ValidRange::default().contains(f64::MIN));
    }
}
