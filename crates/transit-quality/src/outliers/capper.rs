//! Replaces flagged values with the largest retained value.

use crate::types::OutlierMask;

/// Result of capping one series.
#[derive(Debug, Clone, PartialEq)]
pub struct CapOutcome {
    pub values: Vec<Option<f64>>,
    pub mask: OutlierMask,
    pub outlier_count: usize,
}

/// Caps outliers at the maximum of the non-outlier values of the same series.
///
/// The replacement is always a value that was actually observed, never the
/// formula bound.
pub struct Capper;

impl Capper {
    /// Largest present value not flagged by `mask`.
    pub fn retained_max(values: &[Option<f64>], mask: &OutlierMask) -> Option<f64> {
        values
            .iter()
            .enumerate()
            .filter(|(i, _)| !mask.is_flagged(*i))
            .filter_map(|(_, v)| *v)
            .reduce(f64::max)
    }

    pub fn cap(values: &[Option<f64>], mask: OutlierMask) -> CapOutcome {
        let outlier_count = mask.count();
        if outlier_count == 0 {
            return CapOutcome {
                values: values.to_vec(),
                mask,
                outlier_count: 0,
            };
        }

        let Some(ceiling) = Self::retained_max(values, &mask) else {
            // Everything flagged; nothing observed to cap to.
            return CapOutcome {
                values: values.to_vec(),
                mask: OutlierMask::clear(values.len()),
                outlier_count: 0,
            };
        };

        let capped = values
            .iter()
            .enumerate()
            .map(|(i, v)| if mask.is_flagged(i) { Some(ceiling) } else { *v })
            .collect();

        CapOutcome {
            values: capped,
            mask,
            outlier_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_uses_retained_max_not_bound() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)];
        let mask = OutlierMask::new(vec![false, false, false, false, true]);
        let outcome = Capper::cap(&values, mask);
        assert_eq!(
            outcome.values,
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(outcome.outlier_count, 1);
    }

    #[test]
    fn test_cap_without_outliers_is_identity() {
        let values = vec![Some(3.0), None, Some(1.0)];
        let outcome = Capper::cap(&values, OutlierMask::clear(3));
        assert_eq!(outcome.values, values);
        assert_eq!(outcome.outlier_count, 0);
    }

    #[test]
    fn test_retained_max_skips_missing() {
        let values = vec![None, Some(2.0), Some(9.0)];
        let mask = OutlierMask::new(vec![false, false, true]);
        assert_eq!(Capper::retained_max(&values, &mask), Some(2.0));
    }
}
