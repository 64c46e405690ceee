//! Stop directory used by the presentation layer.

use crate::error::Result;
use crate::utils::{group_keys, integer_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Travel direction of a stop along the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "상행")]
    Up,
    #[serde(rename = "하행")]
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub id: i64,
    pub name: String,
    pub direction: Direction,
}

/// One entry per distinct stop sequence number, sorted by sequence.
///
/// The first name seen for a sequence wins. Stops in the first half of the
/// sequence range (`seq <= max / 2`) are marked [`Direction::Up`].
/// Rows with a null sequence or name are ignored.
pub fn build_stop_directory(df: &DataFrame, seq_column: &str, name_column: &str) -> Result<Vec<Stop>> {
    let sequences = integer_values(df, seq_column)?;
    let names = group_keys(df, name_column)?;

    let mut first_names: BTreeMap<i64, String> = BTreeMap::new();
    for (seq, name) in sequences.into_iter().zip(names) {
        if let (Some(seq), Some(name)) = (seq, name) {
            first_names.entry(seq).or_insert(name);
        }
    }

    let Some(&max_seq) = first_names.keys().next_back() else {
        return Ok(Vec::new());
    };
    let mid = max_seq.div_euclid(2);

    Ok(first_names
        .into_iter()
        .map(|(id, name)| Stop {
            id,
            name,
            direction: if id <= mid { Direction::Up } else { Direction::Down },
        })
        .collect())
}
