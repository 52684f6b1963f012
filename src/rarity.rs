//! Rarity classes and the weighted option selector.
//!
//! Each layer option belongs to one of five rarity classes. Classes map to
//! fixed relative weights (not probabilities — the draw is uniform over the
//! summed weight range):
//!
//! | Class | Code | Weight |
//! |-------|------|--------|
//! | Basic | `b`  | 60 |
//! | Low | `l`  | 30 |
//! | Medium | `m`  | 15 |
//! | Rare | `r`  | 5 |
//! | Super Rare | `sr` | 2 |
//!
//! An option without a recognized code is treated as Basic, so a layer of
//! unannotated files degrades to a uniform draw.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUPER_RARE_WEIGHT: u32 = 2;
const RARE_WEIGHT: u32 = 5;
const MEDIUM_WEIGHT: u32 = 15;
const LOW_WEIGHT: u32 = 30;
const BASIC_WEIGHT: u32 = 60;

/// Ordinal weighting bucket driving selection probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    #[serde(rename = "Basic")]
    Basic,
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Rare")]
    Rare,
    #[serde(rename = "Super Rare")]
    SuperRare,
}

impl Rarity {
    /// Relative selection weight for this class.
    pub fn weight(self) -> u32 {
        match self {
            Rarity::Basic => BASIC_WEIGHT,
            Rarity::Low => LOW_WEIGHT,
            Rarity::Medium => MEDIUM_WEIGHT,
            Rarity::Rare => RARE_WEIGHT,
            Rarity::SuperRare => SUPER_RARE_WEIGHT,
        }
    }

    /// Decode a filename rarity suffix (`sr`, `r`, `m`, `l`, `b`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "b" => Some(Rarity::Basic),
            "l" => Some(Rarity::Low),
            "m" => Some(Rarity::Medium),
            "r" => Some(Rarity::Rare),
            "sr" => Some(Rarity::SuperRare),
            _ => None,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rarity::Basic => "Basic",
            Rarity::Low => "Low",
            Rarity::Medium => "Medium",
            Rarity::Rare => "Rare",
            Rarity::SuperRare => "Super Rare",
        };
        f.write_str(s)
    }
}

/// Pick one index from a weighted list of rarity classes.
///
/// Each class claims a contiguous range of the `[0, total_weight)` line in
/// list order; a uniform draw lands in one of them. Returns `None` for an
/// empty list.
///
/// The bound check is inclusive (`draw <= cumulative`), which at exact range
/// boundaries resolves ties to the earlier option. That matches the observed
/// production distribution and is kept as-is.
pub fn rarity_randomiser(classes: &[Rarity], rng: &mut impl Rng) -> Option<usize> {
    if classes.is_empty() {
        return None;
    }

    let mut bounds: Vec<u32> = Vec::with_capacity(classes.len());
    let mut total: u32 = 0;
    for class in classes {
        total += class.weight();
        bounds.push(total);
    }

    let draw = rng.random_range(0..total);
    bounds.iter().position(|&bound| draw <= bound)
}
