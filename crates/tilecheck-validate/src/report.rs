//! Human-readable and JSON renderings of a [`ValidationResult`].

use crate::{Mismatch, MismatchKey, Strategy, Unchecked, ValidationResult, Verdict};
use serde::Serialize;
use std::fmt;

/// Formats validation results for one labelled unit of work (typically a
/// `tileset-z-x-y` string).
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    label: String,
    max_listed: Option<usize>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    label: &'a str,
    strategy: Strategy,
    verdict: Verdict,
    total_units_checked: usize,
    passed: usize,
    failed: usize,
    mismatches: &'a [Mismatch],
    unchecked: Unchecked,
}

impl ReportBuilder {
    /// Report builder for the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            max_listed: None,
        }
    }

    /// List at most `n` failing keys in text output.
    pub fn max_listed(mut self, n: usize) -> Self {
        self.max_listed = Some(n);
        self
    }

    /// Label the report was built for.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Plain text summary.
    pub fn text(&self, result: &ValidationResult) -> String {
        TextReport { builder: self, result }.to_string()
    }

    /// JSON document for machine consumption.
    pub fn json(&self, result: &ValidationResult) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.json_report(result))
    }

    /// JSON value, for embedding in a larger document.
    pub fn json_value(&self, result: &ValidationResult) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.json_report(result))
    }

    fn json_report<'a>(&'a self, result: &'a ValidationResult) -> JsonReport<'a> {
        JsonReport {
            label: &self.label,
            strategy: result.strategy,
            verdict: result.verdict(),
            total_units_checked: result.total_units_checked,
            passed: result.passed(),
            failed: result.failed(),
            mismatches: &result.mismatches,
            unchecked: result.unchecked,
        }
    }
}

struct TextReport<'a> {
    builder: &'a ReportBuilder,
    result: &'a ValidationResult,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, result) = (&self.builder.label, self.result);
        let (unit, units) = match result.strategy {
            Strategy::AggregateComparison => ("latitude", "latitudes"),
            Strategy::PointQueryComparison => ("point", "points"),
        };
        let plural = |n: usize| if n == 1 { unit } else { units };

        writeln!(f, "{}: {} comparison finished", label, result.strategy)?;
        writeln!(
            f,
            "{}: checked {} {}, {} valid, {} failed",
            label,
            result.total_units_checked,
            plural(result.total_units_checked),
            result.passed(),
            result.failed()
        )?;

        if !result.mismatches.is_empty() {
            let limit = self.builder.max_listed.unwrap_or(usize::MAX);
            match result.strategy {
                Strategy::AggregateComparison => {
                    let keys: Vec<String> = result
                        .mismatches
                        .iter()
                        .take(limit)
                        .map(|m| m.key.to_string())
                        .collect();
                    writeln!(f, "Validation failed at the following latitudes: {}", keys.join(", "))?;
                }
                Strategy::PointQueryComparison => {
                    writeln!(f, "Validation failed for the following rows:")?;
                    for mismatch in result.mismatches.iter().take(limit) {
                        writeln!(f, "  {}", describe(mismatch))?;
                    }
                }
            }
            if result.mismatches.len() > limit {
                writeln!(f, "  ... and {} more", result.mismatches.len() - limit)?;
            }
            if result.strategy == Strategy::AggregateComparison {
                writeln!(f, "Hint: run the point-query strategy on this tile to find the failing rows.")?;
            }
        }

        let unchecked = &result.unchecked;
        match result.strategy {
            Strategy::AggregateComparison if unchecked.source_only + unchecked.tile_only > 0 => {
                writeln!(
                    f,
                    "Not compared: {} latitudes only in the source, {} only in the tile",
                    unchecked.source_only, unchecked.tile_only
                )?;
            }
            Strategy::PointQueryComparison if unchecked.not_found + unchecked.lookup_unavailable > 0 => {
                writeln!(
                    f,
                    "Not compared: {} points without a tile feature, {} lookups unavailable",
                    unchecked.not_found, unchecked.lookup_unavailable
                )?;
            }
            _ => {}
        }

        if result.verdict() == Verdict::Inconclusive {
            writeln!(f, "Nothing was compared: the source and tile keys never lined up for this tile.")?;
        }
        writeln!(f, "Verdict: {}", result.verdict())
    }
}

fn describe(mismatch: &Mismatch) -> String {
    match &mismatch.key {
        MismatchKey::Row { line, raw } => format!(
            "line {}: {} ('{}' source {} vs tile {})",
            line, raw, mismatch.attribute, mismatch.source_value, mismatch.tile_value
        ),
        key => format!(
            "{} ('{}' source {} vs tile {})",
            key, mismatch.attribute, mismatch.source_value, mismatch.tile_value
        ),
    }
}
