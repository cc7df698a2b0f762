//! The two validation strategies.
//!
//! # Aggregate Comparison
//!
//! Both point sets are bucketed by latitude and averaged; every latitude
//! present on both sides is one checked unit, and it fails when any
//! attribute mean differs (exact equality). Latitudes seen on one side only
//! are counted as unchecked, never as failures.
//!
//! # Point Query Comparison
//!
//! Every source point is looked up against the decoded tile geometry at its
//! unrounded coordinates. A point with a hit is one checked unit and fails
//! on the first attribute whose value differs from the closest hit. Points
//! without a hit, or whose lookup failed, are unchecked.
//!
//! A practical recipe: run Aggregate Comparison first, then Point Query
//! Comparison on the failing tiles to get the individual bad rows.

use crate::{
    AggregateRow, LatKey, LatitudeAggregator, Mismatch, MismatchKey, Result, ValidateError, ValidationResult,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tilecheck_mvt::{FeatureLookup, QueryOptions, TileFeature};
use tilecheck_source::{CancelFlag, SourcePoint};
use tracing::{debug, info, warn};

/// Default number of points between progress callbacks.
pub const DEFAULT_PROGRESS_EVERY: usize = 1000;

/// Validation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Compare per-latitude attribute means.
    #[default]
    #[serde(rename = "aggregate")]
    AggregateComparison,
    /// Look up each source point in the tile and compare fields.
    #[serde(rename = "point-query")]
    PointQueryComparison,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::AggregateComparison => f.write_str("aggregate"),
            Strategy::PointQueryComparison => f.write_str("point-query"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "aggregate" => Ok(Strategy::AggregateComparison),
            "point-query" => Ok(Strategy::PointQueryComparison),
            other => Err(format!(
                "unknown strategy '{}' (expected 'aggregate' or 'point-query')",
                other
            )),
        }
    }
}

/// Compare two aggregate row lists by latitude.
pub fn compare_aggregates(source: &[AggregateRow], tile: &[AggregateRow], attributes: &[String]) -> ValidationResult {
    let mut result = ValidationResult::new(Strategy::AggregateComparison);
    let tile_rows: BTreeMap<LatKey, &AggregateRow> = tile.iter().map(|row| (row.key, row)).collect();

    for source_row in source {
        let Some(tile_row) = tile_rows.get(&source_row.key) else {
            result.unchecked.source_only += 1;
            continue;
        };
        result.total_units_checked += 1;

        for name in attributes {
            let expected = source_row.mean(name).unwrap_or(f64::NAN);
            let found = tile_row.mean(name).unwrap_or(f64::NAN);
            if expected != found {
                debug!(
                    "Latitude {}: '{}' source mean {} ({} points) vs tile mean {} ({} points)",
                    source_row.key, name, expected, source_row.sample_count, found, tile_row.sample_count
                );
                result.mismatches.push(Mismatch {
                    key: MismatchKey::Latitude { lat: source_row.key },
                    attribute: name.clone(),
                    source_value: expected,
                    tile_value: found,
                });
                break;
            }
        }
    }

    let source_keys: std::collections::BTreeSet<LatKey> = source.iter().map(|row| row.key).collect();
    result.unchecked.tile_only = tile.iter().filter(|row| !source_keys.contains(&row.key)).count();
    result.mismatches.sort_by(|a, b| a.key.cmp(&b.key));
    result
}

/// Aggregate Comparison over one tile's point sets.
///
/// With `co_filter`, tile points are kept only at rounded longitudes the
/// source covers for the same latitude, so features belonging to the tile
/// buffer or to a neighbouring tile do not shift the means.
pub fn aggregate_comparison(
    source: &[SourcePoint],
    features: &[TileFeature],
    attributes: &[String],
    co_filter: bool,
) -> ValidationResult {
    let aggregator = LatitudeAggregator::new(attributes.to_vec());
    let source_buckets = aggregator.group_source(source);
    let mut tile_buckets = aggregator.group_features(features);
    if co_filter {
        tile_buckets.retain_covered_by(&source_buckets);
    }

    let source_rows = aggregator.average(&source_buckets);
    let tile_rows = aggregator.average(&tile_buckets);
    debug!(
        "Aggregated {} source points into {} latitudes, {} tile features into {} latitudes",
        source.len(),
        source_rows.len(),
        tile_buckets.point_count(),
        tile_rows.len()
    );

    compare_aggregates(&source_rows, &tile_rows, attributes)
}

/// Progress of a point query run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Points processed so far.
    pub processed: usize,
    /// Points in the run.
    pub total: usize,
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Settings for Point Query Comparison.
pub struct PointQueryOptions {
    /// Lookup options passed to the backend for every point.
    pub query: QueryOptions,
    /// Progress callback cadence, in points. Zero disables periodic calls;
    /// a final call is always made.
    pub progress_every: usize,
    /// Run lookups on the rayon thread pool.
    pub parallel: bool,
    /// Progress callback.
    pub progress: Option<ProgressCallback>,
    /// Checked between points.
    pub cancel: Option<CancelFlag>,
}

impl Default for PointQueryOptions {
    fn default() -> Self {
        Self {
            query: QueryOptions::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            parallel: false,
            progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for PointQueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointQueryOptions")
            .field("query", &self.query)
            .field("progress_every", &self.progress_every)
            .field("parallel", &self.parallel)
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

enum PointOutcome {
    Matched,
    Mismatched(Mismatch),
    NotFound,
    Unavailable,
}

/// Point Query Comparison over one tile's source points.
///
/// Fails only with [`ValidateError::Cancelled`]; a cancelled run returns no
/// partial result.
pub fn point_query_comparison<L>(
    points: &[SourcePoint],
    lookup: &L,
    attributes: &[String],
    options: &PointQueryOptions,
) -> Result<ValidationResult>
where
    L: FeatureLookup + Sync,
{
    let total = points.len();
    let processed = AtomicUsize::new(0);
    let is_cancelled = || options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled);

    let step = |point: &SourcePoint| -> Option<PointOutcome> {
        if is_cancelled() {
            return None;
        }
        let outcome = check_point(point, lookup, attributes, &options.query);
        let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(callback) = &options.progress {
            if options.progress_every > 0 && done % options.progress_every == 0 && done < total {
                callback(Progress { processed: done, total });
            }
        }
        Some(outcome)
    };

    let outcomes: Vec<Option<PointOutcome>> = if options.parallel {
        points.par_iter().map(step).collect()
    } else {
        let mut outcomes = Vec::with_capacity(total);
        for point in points {
            let outcome = step(point);
            let stop = outcome.is_none();
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    };

    if is_cancelled() || outcomes.iter().any(Option::is_none) {
        info!("Point query cancelled after {} of {} points", processed.load(Ordering::Relaxed), total);
        return Err(ValidateError::Cancelled);
    }

    if let Some(callback) = &options.progress {
        callback(Progress { processed: total, total });
    }

    let mut result = ValidationResult::new(Strategy::PointQueryComparison);
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            PointOutcome::Matched => result.total_units_checked += 1,
            PointOutcome::Mismatched(mismatch) => {
                result.total_units_checked += 1;
                result.mismatches.push(mismatch);
            }
            PointOutcome::NotFound => result.unchecked.not_found += 1,
            PointOutcome::Unavailable => result.unchecked.lookup_unavailable += 1,
        }
    }
    result.mismatches.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(result)
}

fn check_point<L: FeatureLookup>(
    point: &SourcePoint,
    lookup: &L,
    attributes: &[String],
    query: &QueryOptions,
) -> PointOutcome {
    let hits = match lookup.lookup(point.lon, point.lat, query) {
        Ok(hits) => hits,
        Err(e) => {
            debug!("Line {}: {}", point.record.line, e);
            return PointOutcome::Unavailable;
        }
    };
    let Some(hit) = hits.first() else {
        return PointOutcome::NotFound;
    };

    for name in attributes {
        let expected = point.value(name).unwrap_or(f64::NAN);
        let found = hit.feature.property(name).unwrap_or(f64::NAN);
        if expected != found {
            warn!(
                "Line {}: '{}' is {} in the source but {} in the tile (feature properties {:?}); row: {}",
                point.record.line, name, expected, found, hit.feature.properties, point.record.raw
            );
            return PointOutcome::Mismatched(Mismatch {
                key: MismatchKey::Row {
                    line: point.record.line,
                    raw: point.record.raw.clone(),
                },
                attribute: name.clone(),
                source_value: expected,
                tile_value: found,
            });
        }
    }
    PointOutcome::Matched
}
