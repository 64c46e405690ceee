//! IQR-based upper-bound outlier detection.

use crate::types::OutlierMask;
use crate::utils::quantile_sorted;
use serde::{Deserialize, Serialize};

/// Quartiles and derived upper bound of a series' positive values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub upper_bound: f64,
}

/// Flags values above `Q3 + multiplier * IQR`.
///
/// Quartiles are estimated from the strictly positive values only; zero is
/// a valid "no activity" observation and never contributes to the bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDetector {
    multiplier: f64,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self { multiplier: 3.0 }
    }
}

impl OutlierDetector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Compute the bounds, or `None` when the series has no positive values.
    pub fn bounds(&self, values: &[Option<f64>]) -> Option<IqrBounds> {
        let mut positive: Vec<f64> = values.iter().flatten().copied().filter(|v| *v > 0.0).collect();
        if positive.is_empty() {
            return None;
        }
        positive.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile_sorted(&positive, 0.25)?;
        let q3 = quantile_sorted(&positive, 0.75)?;
        let iqr = q3 - q1;

        Some(IqrBounds {
            q1,
            q3,
            iqr,
            upper_bound: q3 + self.multiplier * iqr,
        })
    }

    /// Flag every present value strictly greater than the upper bound.
    pub fn detect(&self, values: &[Option<f64>]) -> OutlierMask {
        match self.bounds(values) {
            Some(bounds) => OutlierMask::new(
                values
                    .iter()
                    .map(|v| v.is_some_and(|x| x > bounds.upper_bound))
                    .collect(),
            ),
            None => OutlierMask::clear(values.len()),
        }
    }
}
