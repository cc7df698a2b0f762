use crate::{LatKey, Strategy};
use serde::Serialize;
use std::fmt;

/// What a mismatch refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MismatchKey {
    /// A latitude bucket (Aggregate Comparison).
    Latitude {
        /// Bucket latitude.
        lat: LatKey,
    },
    /// A source row (Point Query Comparison).
    Row {
        /// 1-based line number in the source file.
        line: u64,
        /// The row as read.
        raw: String,
    },
}

impl fmt::Display for MismatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKey::Latitude { lat } => write!(f, "{}", lat),
            MismatchKey::Row { line, raw } => write!(f, "line {}: {}", line, raw),
        }
    }
}

/// One failed unit, with the first attribute that differed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    /// Failed unit.
    pub key: MismatchKey,
    /// First attribute whose values differed.
    pub attribute: String,
    /// Value (or mean) on the source side.
    pub source_value: f64,
    /// Value (or mean) on the tile side.
    pub tile_value: f64,
}

/// Units that took part in the run but were not compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Unchecked {
    /// Latitudes with source data but no tile data.
    pub source_only: usize,
    /// Latitudes with tile data but no source data.
    pub tile_only: usize,
    /// Source points where no tile feature was found.
    pub not_found: usize,
    /// Source points whose lookup failed.
    pub lookup_unavailable: usize,
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// At least one unit was checked and none failed.
    Pass,
    /// At least one unit failed.
    Fail,
    /// Nothing was checked; usually a sign the two point sets never paired up.
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(s)
    }
}

/// Result of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Strategy that produced the result.
    pub strategy: Strategy,
    /// Units (latitudes or rows) that were compared.
    pub total_units_checked: usize,
    /// Failed units, in ascending key order.
    pub mismatches: Vec<Mismatch>,
    /// Units that were seen but not compared.
    pub unchecked: Unchecked,
}

impl ValidationResult {
    pub(crate) fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            total_units_checked: 0,
            mismatches: Vec::new(),
            unchecked: Unchecked::default(),
        }
    }

    /// Keys of the failed units, in ascending order.
    pub fn mismatched_keys(&self) -> Vec<&MismatchKey> {
        self.mismatches.iter().map(|m| &m.key).collect()
    }

    /// Number of failed units.
    pub fn failed(&self) -> usize {
        self.mismatches.len()
    }

    /// Number of units that passed.
    pub fn passed(&self) -> usize {
        self.total_units_checked.saturating_sub(self.mismatches.len())
    }

    /// Overall verdict.
    pub fn verdict(&self) -> Verdict {
        if self.total_units_checked == 0 {
            Verdict::Inconclusive
        } else if self.mismatches.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}
