//! Declared discrete key dimensions and their cross product.

use crate::types::KeyTuple;
use serde::{Deserialize, Serialize};

/// Days of week, Monday = 0.
pub const DAYS_OF_WEEK: std::ops::RangeInclusive<i64> = 0..=6;
/// Hours of day.
pub const HOURS_OF_DAY: std::ops::RangeInclusive<i64> = 0..=23;

/// The domains of the three key dimensions, each sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDomains {
    entities: Vec<i64>,
    secondary: Vec<i64>,
    tertiary: Vec<i64>,
}

impl DimensionDomains {
    pub fn new(
        entities: impl IntoIterator<Item = i64>,
        secondary: impl IntoIterator<Item = i64>,
        tertiary: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            entities: normalize(entities),
            secondary: normalize(secondary),
            tertiary: normalize(tertiary),
        }
    }

    /// Entities × day of week (0-6) × hour of day (0-23).
    pub fn weekly_hourly(entities: impl IntoIterator<Item = i64>) -> Self {
        Self::new(entities, DAYS_OF_WEEK, HOURS_OF_DAY)
    }

    pub fn entities(&self) -> &[i64] {
        &self.entities
    }

    pub fn secondary(&self) -> &[i64] {
        &self.secondary
    }

    pub fn tertiary(&self) -> &[i64] {
        &self.tertiary
    }

    /// Number of cells in the cross product.
    pub fn cardinality(&self) -> usize {
        self.entities.len() * self.secondary.len() * self.tertiary.len()
    }

    /// Every key of the cross product, in ascending key order.
    pub fn keys(&self) -> impl Iterator<Item = KeyTuple> + '_ {
        self.entities.iter().flat_map(move |&entity| {
            self.secondary.iter().flat_map(move |&secondary| {
                self.tertiary
                    .iter()
                    .map(move |&tertiary| KeyTuple::new(entity, secondary, tertiary))
            })
        })
    }
}

fn normalize(values: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut values: Vec<i64> = values.into_iter().collect();
    values.sort_unstable();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_are_sorted_and_deduplicated() {
        let domains = DimensionDomains::new([3, 1, 3, 2], [1, 0], [0]);
        assert_eq!(domains.entities(), &[1, 2, 3]);
        assert_eq!(domains.secondary(), &[0, 1]);
        assert_eq!(domains.cardinality(), 6);
    }

    #[test]
    fn test_keys_cover_cross_product_in_order() {
        let domains = DimensionDomains::new([2, 1], [0, 1], [0]);
        let keys: Vec<KeyTuple> = domains.keys().collect();
        assert_eq!(
            keys,
            vec![
                KeyTuple::new(1, 0, 0),
                KeyTuple::new(1, 1, 0),
                KeyTuple::new(2, 0, 0),
                KeyTuple::new(2, 1, 0),
            ]
        );
    }

    #[test]
    fn test_weekly_hourly() {
        let domains = DimensionDomains::weekly_hourly([101, 102]);
        assert_eq!(domains.cardinality(), 2 * 7 * 24);
        assert_eq!(domains.keys().count(), 336);
        assert_eq!(domains.tertiary().last(), Some(&23));
    }

    #[test]
    fn test_empty_entities() {
        let domains = DimensionDomains::weekly_hourly(Vec::new());
        assert_eq!(domains.cardinality(), 0);
        assert_eq!(domains.keys().count(), 0);
    }
}
