//! Small in-memory tile encoder.
//!
//! Produces valid tile buffers from pixel coordinates. Used to synthesise
//! fixture tiles for tests and local experiments; it is not a general tiling
//! pipeline (no clipping, simplification or value sharing across features).

use flate2::write::GzEncoder;
use flate2::Compression;
use geo_types::{Coord, Geometry, LineString, Point, Polygon};
use geozero::error::{GeozeroError, Result as GeozeroResult};
use geozero::mvt::tile;
use geozero::mvt::{Message, Tile};
use geozero::ToMvt;
use std::io::Write;

/// Builder for a tile with one or more layers.
///
/// Features are appended to the most recently started layer; a layer named
/// `"default"` with extent 4096 is started implicitly if needed. The first
/// geometry that cannot be encoded is reported by [`TileBuilder::encode`].
#[derive(Debug, Default)]
pub struct TileBuilder {
    layers: Vec<tile::Layer>,
    error: Option<GeozeroError>,
}

impl TileBuilder {
    /// Empty tile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new layer.
    pub fn layer(mut self, name: &str, extent: u32) -> Self {
        self.layers.push(tile::Layer {
            version: 2,
            name: name.to_string(),
            extent: Some(extent),
            ..Default::default()
        });
        self
    }

    /// Add a polygon with a single exterior ring, given in tile pixels.
    ///
    /// The ring should be clockwise on screen (x right, y down); it is closed
    /// automatically.
    pub fn polygon(self, ring: &[(i32, i32)], properties: &[(&str, f64)]) -> Self {
        let polygon = Polygon::new(pixel_ring(ring), Vec::new());
        self.geometry(Geometry::Polygon(polygon), properties)
    }

    /// Add a single point, given in tile pixels.
    pub fn point(self, x: i32, y: i32, properties: &[(&str, f64)]) -> Self {
        self.geometry(Geometry::Point(Point::new(x as f64, y as f64)), properties)
    }

    /// Add any geometry in tile pixel coordinates. Coordinates are truncated
    /// to integers; polygon exteriors must be clockwise on screen and holes
    /// counter-clockwise.
    pub fn geometry(mut self, geometry: Geometry<f64>, properties: &[(&str, f64)]) -> Self {
        match geometry.to_mvt() {
            Ok(feature) => self.push_feature(feature, properties),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    fn push_feature(mut self, mut feature: tile::Feature, properties: &[(&str, f64)]) -> Self {
        if self.layers.is_empty() {
            self = self.layer("default", tilecheck_geo::DEFAULT_EXTENT);
        }
        let Some(layer) = self.layers.last_mut() else {
            return self;
        };

        let mut tags = Vec::with_capacity(properties.len() * 2);
        for &(key, value) in properties {
            let key_index = match layer.keys.iter().position(|k| k == key) {
                Some(i) => i,
                None => {
                    layer.keys.push(key.to_string());
                    layer.keys.len() - 1
                }
            };
            layer.values.push(tile::Value {
                double_value: Some(value),
                ..Default::default()
            });
            tags.push(key_index as u32);
            tags.push((layer.values.len() - 1) as u32);
        }

        feature.id = Some(layer.features.len() as u64 + 1);
        feature.tags = tags;
        layer.features.push(feature);
        self
    }

    /// Encode as a raw protobuf buffer.
    pub fn encode(self) -> GeozeroResult<Vec<u8>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Tile { layers: self.layers }.encode_to_vec())
    }

    /// Encode and gzip-compress.
    pub fn encode_gzip(self) -> GeozeroResult<Vec<u8>> {
        let raw = self.encode()?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }
}

fn pixel_ring(ring: &[(i32, i32)]) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| Coord {
            x: x as f64,
            y: y as f64,
        })
        .collect()
}
