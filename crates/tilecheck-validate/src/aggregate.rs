//! Latitude bucketing and per-bucket means.
//!
//! Both point sets of a tile are reduced the same way: points are grouped by
//! their one-decimal latitude, sorted by longitude inside each group, and
//! every attribute is averaged per group. The resulting rows pair up by
//! latitude across the two sets.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tilecheck_geo::round_to_tenth;
use tilecheck_mvt::TileFeature;
use tilecheck_source::SourcePoint;

/// Latitude bucket key, stored as integer tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatKey(i32);

impl LatKey {
    /// Key of the bucket containing `lat` (rounded to one decimal).
    pub fn from_degrees(lat: f64) -> Self {
        Self((lat * 10.0).round() as i32)
    }

    /// Bucket latitude in degrees.
    pub fn degrees(&self) -> f64 {
        self.0 as f64 / 10.0
    }

    /// Bucket latitude in tenths of a degree.
    pub fn tenths(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for LatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.degrees())
    }
}

impl Serialize for LatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.degrees())
    }
}

/// A point reduced to what bucketing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketPoint {
    /// Longitude rounded to one decimal.
    pub lon: f64,
    /// Latitude rounded to one decimal.
    pub lat: f64,
    /// Attribute values, aligned with the aggregator's attribute list.
    pub values: Vec<f64>,
}

impl BucketPoint {
    /// Bucket point from a source observation. Attributes the point does not
    /// carry are NaN.
    pub fn from_source(point: &SourcePoint, attributes: &[String]) -> Self {
        Self {
            lon: point.rounded_lon(),
            lat: point.rounded_lat(),
            values: attributes
                .iter()
                .map(|name| point.value(name).unwrap_or(f64::NAN))
                .collect(),
        }
    }

    /// Bucket point from a decoded tile feature. Missing properties are NaN,
    /// so a bucket containing such a feature never matches.
    pub fn from_feature(feature: &TileFeature, attributes: &[String]) -> Self {
        Self {
            lon: round_to_tenth(feature.lon),
            lat: round_to_tenth(feature.lat),
            values: attributes
                .iter()
                .map(|name| feature.property(name).unwrap_or(f64::NAN))
                .collect(),
        }
    }

    fn lon_tenths(&self) -> i64 {
        (self.lon * 10.0).round() as i64
    }
}

/// Points grouped by latitude, each group sorted by ascending longitude.
///
/// Empty groups are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatitudeBuckets {
    buckets: BTreeMap<LatKey, Vec<BucketPoint>>,
}

impl LatitudeBuckets {
    /// Points of one bucket.
    pub fn get(&self, key: LatKey) -> Option<&[BucketPoint]> {
        self.buckets.get(&key).map(Vec::as_slice)
    }

    /// Buckets in ascending latitude order.
    pub fn iter(&self) -> impl Iterator<Item = (LatKey, &[BucketPoint])> + '_ {
        self.buckets.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True when there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of points over all buckets.
    pub fn point_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Keep only points whose rounded longitude also appears in `other`'s
    /// bucket for the same latitude. Buckets left empty are removed.
    pub fn retain_covered_by(&mut self, other: &LatitudeBuckets) {
        let before = self.point_count();
        self.buckets.retain(|key, points| {
            let Some(covering) = other.buckets.get(key) else {
                return false;
            };
            let longitudes: BTreeSet<i64> = covering.iter().map(BucketPoint::lon_tenths).collect();
            points.retain(|p| longitudes.contains(&p.lon_tenths()));
            !points.is_empty()
        });
        tracing::debug!(
            "Longitude co-filter kept {} of {} points in {} buckets",
            self.point_count(),
            before,
            self.len()
        );
    }
}

/// Mean attribute values of one latitude bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// Bucket latitude in degrees.
    pub lat: f64,
    /// Bucket key.
    #[serde(skip)]
    pub key: LatKey,
    /// Mean of each attribute.
    pub means: BTreeMap<String, f64>,
    /// Number of points folded into the bucket.
    pub sample_count: usize,
}

impl AggregateRow {
    /// Mean of a named attribute.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.means.get(name).copied()
    }
}

/// Groups points by latitude and averages them.
#[derive(Debug, Clone)]
pub struct LatitudeAggregator {
    attributes: Vec<String>,
}

impl LatitudeAggregator {
    /// Aggregator over the given attributes.
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }

    /// Attribute names, in comparison order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Group points into latitude buckets.
    ///
    /// Inside a bucket, points are ordered by longitude; points with equal
    /// longitude keep their input order.
    pub fn group<I>(&self, points: I) -> LatitudeBuckets
    where
        I: IntoIterator<Item = BucketPoint>,
    {
        let mut buckets: BTreeMap<LatKey, Vec<BucketPoint>> = BTreeMap::new();
        for point in points {
            buckets.entry(LatKey::from_degrees(point.lat)).or_default().push(point);
        }
        for points in buckets.values_mut() {
            points.sort_by(|a, b| a.lon.total_cmp(&b.lon));
        }
        LatitudeBuckets { buckets }
    }

    /// Group source observations.
    pub fn group_source(&self, points: &[SourcePoint]) -> LatitudeBuckets {
        self.group(points.iter().map(|p| BucketPoint::from_source(p, &self.attributes)))
    }

    /// Group decoded tile features.
    pub fn group_features(&self, features: &[TileFeature]) -> LatitudeBuckets {
        self.group(features.iter().map(|f| BucketPoint::from_feature(f, &self.attributes)))
    }

    /// One row per bucket with the mean of every attribute, in ascending
    /// latitude order. A point with fewer values than there are attributes
    /// contributes NaN for the ones it lacks.
    pub fn average(&self, buckets: &LatitudeBuckets) -> Vec<AggregateRow> {
        buckets
            .iter()
            .map(|(key, points)| {
                let count = points.len();
                let means = self
                    .attributes
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let sum: f64 = points
                            .iter()
                            .map(|p| p.values.get(i).copied().unwrap_or(f64::NAN))
                            .sum();
                        (name.clone(), sum / count as f64)
                    })
                    .collect();
                AggregateRow {
                    lat: key.degrees(),
                    key,
                    means,
                    sample_count: count,
                }
            })
            .collect()
    }
}
