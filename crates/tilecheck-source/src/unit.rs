//! Dataset units and the numeric coercion policies derived from them.
//!
//! Values in the authoritative dataset went through a rounding step when
//! they were loaded into the tiling pipeline. Comparing against tiles only
//! works if the same step is replayed on the source side:
//!
//! | Policy                 | Effect                                | Default for        |
//! |------------------------|---------------------------------------|--------------------|
//! | `truncate`             | integer part (`6.96 -> 6`, `-2.7 -> -2`) | days, %, class  |
//! | `floor`                | round toward negative infinity        | °C, mm, cm         |
//! | `round-one-decimal`    | keep one decimal (`0.64 -> 0.6`)      | z-score, likelihood|
//! | `floor-of-one-decimal` | round to one decimal, then floor      | (older map versions) |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tilecheck_geo::round_to_tenth;

/// Unit a dataset's values are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetUnit {
    /// Count of days.
    #[serde(rename = "days")]
    Days,
    /// Temperature in degrees Celsius.
    #[serde(rename = "°C")]
    Celsius,
    /// Percentage.
    #[serde(rename = "%")]
    Percent,
    /// Likelihood, a fraction kept at one decimal.
    #[serde(rename = "likelihood")]
    Likelihood,
    /// Standardised anomaly.
    #[serde(rename = "z-score")]
    ZScore,
    /// Precipitation in millimetres.
    #[serde(rename = "mm")]
    Millimetres,
    /// Length in centimetres.
    #[serde(rename = "cm")]
    Centimetres,
    /// Categorical class number.
    #[serde(rename = "class")]
    Class,
}

impl DatasetUnit {
    /// All units, in declaration order.
    pub const ALL: [DatasetUnit; 8] = [
        DatasetUnit::Days,
        DatasetUnit::Celsius,
        DatasetUnit::Percent,
        DatasetUnit::Likelihood,
        DatasetUnit::ZScore,
        DatasetUnit::Millimetres,
        DatasetUnit::Centimetres,
        DatasetUnit::Class,
    ];

    /// Symbol used in configuration files.
    pub fn symbol(&self) -> &'static str {
        match self {
            DatasetUnit::Days => "days",
            DatasetUnit::Celsius => "°C",
            DatasetUnit::Percent => "%",
            DatasetUnit::Likelihood => "likelihood",
            DatasetUnit::ZScore => "z-score",
            DatasetUnit::Millimetres => "mm",
            DatasetUnit::Centimetres => "cm",
            DatasetUnit::Class => "class",
        }
    }

    /// Coercion policy applied when no explicit override is configured.
    pub fn default_policy(&self) -> ValuePolicy {
        match self {
            DatasetUnit::Days | DatasetUnit::Percent | DatasetUnit::Class => ValuePolicy::Truncate,
            DatasetUnit::Celsius | DatasetUnit::Millimetres | DatasetUnit::Centimetres => ValuePolicy::Floor,
            DatasetUnit::ZScore | DatasetUnit::Likelihood => ValuePolicy::RoundOneDecimal,
        }
    }
}

impl fmt::Display for DatasetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for DatasetUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|unit| unit.symbol() == s)
            .ok_or_else(|| format!("unknown unit '{}'", s))
    }
}

/// Numeric coercion applied to each attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValuePolicy {
    /// Keep the integer part.
    Truncate,
    /// Largest integer not greater than the value.
    Floor,
    /// Round to one decimal digit.
    RoundOneDecimal,
    /// Round to one decimal digit, then floor.
    FloorOfOneDecimal,
}

impl ValuePolicy {
    /// Apply the policy. Non-finite input passes through unchanged and
    /// `-0.0` results are normalised to `0.0`.
    pub fn apply(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let coerced = match self {
            ValuePolicy::Truncate => value.trunc(),
            ValuePolicy::Floor => value.floor(),
            ValuePolicy::RoundOneDecimal => round_to_tenth(value),
            ValuePolicy::FloorOfOneDecimal => round_to_tenth(value).floor(),
        };
        coerced + 0.0
    }
}

impl fmt::Display for ValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValuePolicy::Truncate => "truncate",
            ValuePolicy::Floor => "floor",
            ValuePolicy::RoundOneDecimal => "round-one-decimal",
            ValuePolicy::FloorOfOneDecimal => "floor-of-one-decimal",
        };
        f.write_str(name)
    }
}
