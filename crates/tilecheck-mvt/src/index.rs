//! Spatial lookup over decoded tile features.
//!
//! Point Query Comparison asks, for each source point, which tile feature
//! covers (or is nearest to) that exact coordinate. [`TileIndex`] answers
//! this with an R-tree over the features' bounding rectangles followed by an
//! exact distance test against the full geometry.

use crate::{GeometryKind, LookupError, TileFeature};
use geo::{BoundingRect, Distance, Euclidean};
use geo_types::{Geometry, Point};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Default search radius in degrees: only features covering the point.
pub const DEFAULT_QUERY_RADIUS: f64 = 0.0;

/// Default maximum number of hits returned per query.
pub const DEFAULT_QUERY_LIMIT: usize = 5;

/// Options for a single point query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Search radius in degrees. Features farther than this from the point
    /// are not returned.
    pub radius: f64,
    /// Maximum number of hits.
    pub limit: usize,
    /// Only return features of this geometry kind. `None` returns all kinds.
    pub geometry: Option<GeometryKind>,
    /// Collapse hits whose property sets are identical, keeping the closest.
    pub dedupe: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            radius: DEFAULT_QUERY_RADIUS,
            limit: DEFAULT_QUERY_LIMIT,
            geometry: Some(GeometryKind::Polygon),
            dedupe: true,
        }
    }
}

/// A feature returned by a point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryHit<'a> {
    /// The matched feature.
    pub feature: &'a TileFeature,
    /// Euclidean distance in degrees; 0 when the feature covers the point.
    pub distance: f64,
}

/// Backend answering point queries against tile features.
///
/// Hits are ordered by ascending distance. An empty result means no feature
/// was found; an error means the backend could not answer at all.
pub trait FeatureLookup {
    /// Look up features at `(lon, lat)`.
    fn lookup(&self, lon: f64, lat: f64, options: &QueryOptions) -> Result<Vec<QueryHit<'_>>, LookupError>;
}

struct IndexedEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree backed [`FeatureLookup`] over one tile's features.
pub struct TileIndex {
    features: Vec<TileFeature>,
    tree: RTree<IndexedEnvelope>,
}

impl TileIndex {
    /// Build the index. Features without a bounding rectangle are kept but
    /// never returned by queries.
    pub fn new(features: Vec<TileFeature>) -> Self {
        let entries = features
            .iter()
            .enumerate()
            .filter_map(|(idx, feature)| {
                feature.geometry.bounding_rect().map(|rect| IndexedEnvelope {
                    idx,
                    envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            features,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indexed features, in insertion order.
    pub fn features(&self) -> &[TileFeature] {
        &self.features
    }

    /// Number of indexed features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when the index holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureLookup for TileIndex {
    fn lookup(&self, lon: f64, lat: f64, options: &QueryOptions) -> Result<Vec<QueryHit<'_>>, LookupError> {
        let unavailable = |reason: &str| LookupError::LookupUnavailable {
            lon,
            lat,
            reason: reason.to_string(),
        };
        if !lon.is_finite() || !lat.is_finite() {
            return Err(unavailable("non-finite coordinate"));
        }
        if !options.radius.is_finite() || options.radius < 0.0 {
            return Err(unavailable("radius must be a non-negative finite number"));
        }

        let r = options.radius;
        let search = AABB::from_corners([lon - r, lat - r], [lon + r, lat + r]);
        let point = Point::new(lon, lat);

        let mut candidates: Vec<(usize, f64)> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .filter(|entry| {
                options
                    .geometry
                    .map_or(true, |kind| self.features[entry.idx].kind == kind)
            })
            .map(|entry| (entry.idx, distance_to(&point, &self.features[entry.idx].geometry)))
            .filter(|&(_, distance)| distance <= r)
            .collect();

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut hits: Vec<QueryHit<'_>> = Vec::with_capacity(candidates.len().min(options.limit));
        for (idx, distance) in candidates {
            if hits.len() >= options.limit {
                break;
            }
            let feature = &self.features[idx];
            if options.dedupe && hits.iter().any(|h| h.feature.properties == feature.properties) {
                continue;
            }
            hits.push(QueryHit { feature, distance });
        }
        Ok(hits)
    }
}

fn distance_to(point: &Point<f64>, geometry: &Geometry<f64>) -> f64 {
    Euclidean::distance(point, geometry)
}
