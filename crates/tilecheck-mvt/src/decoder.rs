//! Vector tile buffer decoding.

use crate::geometry::{check_layout, GeometryKind};
use crate::{DecodeError, Result};
use flate2::read::GzDecoder;
use geo::{BoundingRect, MapCoords};
use geo_types::{Coord, Geometry};
use geozero::error::GeozeroError;
use geozero::mvt::tile::{self, GeomType};
use geozero::mvt::{Message, Tile};
use geozero::ToGeo;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::io::Read;
use tilecheck_geo::{tile_pixel_to_lon_lat, tile_pixel_to_lon_lat_exact, BoundingBox, TileAddress};
use tracing::{debug, trace};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One decoded feature.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    /// Name of the layer the feature came from.
    pub layer: String,
    /// Feature id, when the tile carries one.
    pub id: Option<u64>,
    /// Declared geometry type.
    pub kind: GeometryKind,
    /// Longitude of the representative point, rounded to one decimal.
    pub lon: f64,
    /// Latitude of the representative point, rounded to one decimal.
    pub lat: f64,
    /// Numeric properties. String-valued tags are not included.
    pub properties: BTreeMap<String, f64>,
    /// Full geometry in unrounded longitude/latitude.
    pub geometry: Geometry<f64>,
}

impl TileFeature {
    /// Value of a numeric property.
    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied()
    }
}

/// Decoder for Mapbox Vector Tile buffers.
///
/// The decoder is stateless apart from its layer filter and can be shared
/// between threads.
#[derive(Debug, Clone, Default)]
pub struct VectorTileDecoder {
    layers: Vec<String>,
}

impl VectorTileDecoder {
    /// Decoder accepting every layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder restricted to the named layers. An empty list accepts all.
    pub fn with_layers<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            layers: layers.into_iter().map(Into::into).collect(),
        }
    }

    fn accepts_layer(&self, name: &str) -> bool {
        self.layers.is_empty() || self.layers.iter().any(|l| l == name)
    }

    /// Decode every feature of `buffer`, regardless of where its
    /// representative point falls.
    ///
    /// Features are returned in layer order, then feature order. Features
    /// with an unknown geometry type or an empty geometry are skipped.
    pub fn decode_all(&self, buffer: &[u8], tile: &TileAddress) -> Result<Vec<TileFeature>> {
        let data = inflate(buffer)?;
        let decoded = Tile::decode(data.as_ref()).map_err(|e| DecodeError::Protobuf(e.to_string()))?;

        let mut features = Vec::new();
        for layer in &decoded.layers {
            if !self.accepts_layer(&layer.name) {
                trace!("Skipping layer '{}'", layer.name);
                continue;
            }

            let extent = layer.extent();
            if extent == 0 {
                return Err(DecodeError::ZeroExtent {
                    layer: layer.name.clone(),
                });
            }

            let before = features.len();
            for (index, feature) in layer.features.iter().enumerate() {
                if let Some(decoded) = decode_feature(layer, index, feature, extent, tile)? {
                    features.push(decoded);
                }
            }
            debug!(
                "Tile {} layer '{}': {} of {} features decoded (extent {})",
                tile,
                layer.name,
                features.len() - before,
                layer.features.len(),
                extent
            );
        }

        Ok(features)
    }

    /// Decode the features whose representative point lies inside `bbox`.
    pub fn decode(&self, buffer: &[u8], tile: &TileAddress, bbox: &BoundingBox) -> Result<Vec<TileFeature>> {
        let features = self.decode_all(buffer, tile)?;
        let total = features.len();
        let kept: Vec<TileFeature> = features
            .into_iter()
            .filter(|f| bbox.contains(f.lon, f.lat))
            .collect();
        debug!("Tile {}: {} of {} features inside {}", tile, kept.len(), total, bbox);
        Ok(kept)
    }
}

/// Inflate gzip-wrapped tiles; pass anything else through untouched.
fn inflate(buffer: &[u8]) -> Result<Cow<'_, [u8]>> {
    if buffer.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::with_capacity(buffer.len() * 4);
        GzDecoder::new(buffer).read_to_end(&mut out)?;
        Ok(Cow::Owned(out))
    } else {
        Ok(Cow::Borrowed(buffer))
    }
}

fn decode_feature(
    layer: &tile::Layer,
    index: usize,
    feature: &tile::Feature,
    extent: u32,
    tile: &TileAddress,
) -> Result<Option<TileFeature>> {
    let kind = match feature.r#type() {
        GeomType::Point => GeometryKind::Point,
        GeomType::Linestring => GeometryKind::LineString,
        GeomType::Polygon => GeometryKind::Polygon,
        GeomType::Unknown => return Ok(None),
    };

    if feature.geometry.is_empty() {
        return Ok(None);
    }
    let malformed = |reason: String| DecodeError::Geometry {
        layer: layer.name.clone(),
        feature: index,
        reason,
    };
    check_layout(kind, &feature.geometry).map_err(malformed)?;
    let pixel_geometry = feature.to_geo().map_err(|e| malformed(geozero_reason(&e)))?;

    let Some(rect) = pixel_geometry.bounding_rect() else {
        return Ok(None);
    };

    let properties = decode_properties(layer, index, feature)?;

    let center = rect.center();
    let (lon, lat) = tile_pixel_to_lon_lat(extent, tile, center.x, center.y);
    let geometry = pixel_geometry.map_coords(move |c| {
        let (x, y) = tile_pixel_to_lon_lat_exact(extent, tile, c.x, c.y);
        Coord { x, y }
    });

    Ok(Some(TileFeature {
        layer: layer.name.clone(),
        id: feature.id,
        kind,
        lon,
        lat,
        properties,
        geometry,
    }))
}

fn geozero_reason(err: &GeozeroError) -> String {
    match err.source() {
        Some(inner) => format!("{}: {}", err, inner),
        None => err.to_string(),
    }
}

fn decode_properties(
    layer: &tile::Layer,
    index: usize,
    feature: &tile::Feature,
) -> Result<BTreeMap<String, f64>> {
    let invalid = |reason: String| DecodeError::InvalidTags {
        layer: layer.name.clone(),
        feature: index,
        reason,
    };

    if feature.tags.len() % 2 != 0 {
        return Err(invalid(format!("odd tag count {}", feature.tags.len())));
    }

    let mut properties = BTreeMap::new();
    for pair in feature.tags.chunks_exact(2) {
        let key = layer
            .keys
            .get(pair[0] as usize)
            .ok_or_else(|| invalid(format!("key index {} out of range", pair[0])))?;
        let value = layer
            .values
            .get(pair[1] as usize)
            .ok_or_else(|| invalid(format!("value index {} out of range", pair[1])))?;

        if let Some(number) = value_to_f64(value) {
            properties.insert(key.clone(), number);
        }
    }
    Ok(properties)
}

fn value_to_f64(value: &tile::Value) -> Option<f64> {
    if let Some(v) = value.double_value {
        Some(v)
    } else if let Some(v) = value.float_value {
        Some(v as f64)
    } else if let Some(v) = value.int_value {
        Some(v as f64)
    } else if let Some(v) = value.uint_value {
        Some(v as f64)
    } else if let Some(v) = value.sint_value {
        Some(v as f64)
    } else {
        value.bool_value.map(|b| if b { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileBuilder;
    use approx::assert_abs_diff_eq;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use geo_types::{LineString, MultiPoint, Polygon};
    use std::io::Write;
    use tilecheck_geo::{tile_bounding_box, DEFAULT_EXTENT};

    fn tile_435() -> TileAddress {
        TileAddress::new(4, 3, 5).unwrap()
    }

    fn square_at(cx: i32, cy: i32, half: i32) -> Vec<(i32, i32)> {
        vec![
            (cx - half, cy - half),
            (cx + half, cy - half),
            (cx + half, cy + half),
            (cx - half, cy + half),
        ]
    }

    #[test]
    fn test_representative_point_is_bbox_center() {
        let t = tile_435();
        // L-shaped ring; its true centroid differs from its bbox centre (1000, 1000)
        let ring = [(0, 0), (2000, 0), (2000, 400), (400, 400), (400, 2000), (0, 2000)];
        let bytes = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .polygon(&ring, &[("data_1c_mid", 3.0)])
            .encode()
            .unwrap();

        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        assert_eq!(features.len(), 1);
        let (lon, lat) = tile_pixel_to_lon_lat(DEFAULT_EXTENT, &t, 1000.0, 1000.0);
        assert_eq!(features[0].lon, lon);
        assert_eq!(features[0].lat, lat);
        assert_eq!(features[0].kind, GeometryKind::Polygon);
        assert_eq!(features[0].property("data_1c_mid"), Some(3.0));
    }

    #[test]
    fn test_uses_layer_extent() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .layer("coarse", 512)
            .polygon(&square_at(256, 256, 10), &[("v", 1.0)])
            .encode()
            .unwrap();

        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        // The middle of a 512 grid is the middle of a 4096 grid
        let expected = tile_pixel_to_lon_lat(DEFAULT_EXTENT, &t, 2048.0, 2048.0);
        assert_eq!((features[0].lon, features[0].lat), expected);
    }

    #[test]
    fn test_points_and_bbox_filter() {
        let t = tile_435();
        let extent = DEFAULT_EXTENT as i32;
        let bytes = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .point(100, 100, &[("v", 1.0)])
            // Buffer area beyond the tile edge
            .point(extent + 200, 100, &[("v", 2.0)])
            .encode()
            .unwrap();

        let decoder = VectorTileDecoder::new();
        assert_eq!(decoder.decode_all(&bytes, &t).unwrap().len(), 2);

        let inside = decoder.decode(&bytes, &t, &tile_bounding_box(&t)).unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].property("v"), Some(1.0));
        assert_eq!(inside[0].kind, GeometryKind::Point);
    }

    #[test]
    fn test_gzip_input() {
        let t = tile_435();
        let raw = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .point(10, 10, &[("v", 4.0)])
            .encode()
            .unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let gz = encoder.finish().unwrap();

        let plain = VectorTileDecoder::new().decode_all(&raw, &t).unwrap();
        let inflated = VectorTileDecoder::new().decode_all(&gz, &t).unwrap();
        assert_eq!(plain, inflated);
    }

    #[test]
    fn test_layer_filter() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .layer("keep", DEFAULT_EXTENT)
            .point(10, 10, &[("v", 1.0)])
            .layer("drop", DEFAULT_EXTENT)
            .point(20, 20, &[("v", 2.0)])
            .encode()
            .unwrap();

        let features = VectorTileDecoder::with_layers(["keep"]).decode_all(&bytes, &t).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].layer, "keep");
    }

    #[test]
    fn test_string_values_skipped_and_numbers_converted() {
        let t = tile_435();
        let layer = tile::Layer {
            name: "data".to_string(),
            keys: vec!["name".to_string(), "count".to_string(), "flag".to_string()],
            values: vec![
                tile::Value {
                    string_value: Some("north".to_string()),
                    ..Default::default()
                },
                tile::Value {
                    sint_value: Some(-3),
                    ..Default::default()
                },
                tile::Value {
                    bool_value: Some(true),
                    ..Default::default()
                },
            ],
            features: vec![tile::Feature {
                id: Some(7),
                tags: vec![0, 0, 1, 1, 2, 2],
                r#type: Some(GeomType::Point as i32),
                geometry: vec![9, 20, 20],
            }],
            extent: Some(DEFAULT_EXTENT),
            ..Default::default()
        };
        let bytes = Tile { layers: vec![layer] }.encode_to_vec();

        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        assert_eq!(features[0].id, Some(7));
        assert_eq!(features[0].property("name"), None);
        assert_eq!(features[0].property("count"), Some(-3.0));
        assert_eq!(features[0].property("flag"), Some(1.0));
    }

    #[test]
    fn test_skips_empty_and_unknown_geometry() {
        let t = tile_435();
        let layer = tile::Layer {
            name: "data".to_string(),
            features: vec![
                tile::Feature {
                    r#type: Some(GeomType::Polygon as i32),
                    ..Default::default()
                },
                tile::Feature {
                    r#type: Some(GeomType::Unknown as i32),
                    geometry: vec![9, 20, 20],
                    ..Default::default()
                },
            ],
            extent: Some(DEFAULT_EXTENT),
            ..Default::default()
        };
        let bytes = Tile { layers: vec![layer] }.encode_to_vec();
        assert!(VectorTileDecoder::new().decode_all(&bytes, &t).unwrap().is_empty());
    }

    fn pixel_geometry(builder: TileBuilder) -> Geometry<f64> {
        let bytes = builder.encode().unwrap();
        let decoded = Tile::decode(bytes.as_slice()).unwrap();
        decoded.layers[0].features[0].to_geo().unwrap()
    }

    #[test]
    fn test_polygon_ring_is_closed() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .polygon(&square_at(100, 100, 10), &[("v", 1.0)])
            .encode()
            .unwrap();
        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        match &features[0].geometry {
            Geometry::Polygon(polygon) => {
                assert_eq!(polygon.exterior().0.len(), 5);
                assert!(polygon.interiors().is_empty());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_hole_attaches_to_exterior() {
        let exterior = LineString::from(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        // Counter-clockwise on screen
        let hole = LineString::from(vec![(20.0, 20.0), (20.0, 80.0), (80.0, 80.0), (80.0, 20.0)]);
        let builder = TileBuilder::new().geometry(Geometry::Polygon(Polygon::new(exterior, vec![hole])), &[]);

        match pixel_geometry(builder) {
            Geometry::Polygon(polygon) => assert_eq!(polygon.interiors().len(), 1),
            other => panic!("expected polygon with hole, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_point() {
        let points = MultiPoint::from(vec![(5.0, 7.0), (8.0, 9.0)]);
        let t = tile_435();
        let bytes = TileBuilder::new()
            .geometry(Geometry::MultiPoint(points), &[("v", 1.0)])
            .encode()
            .unwrap();

        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        assert_eq!(features[0].kind, GeometryKind::Point);
        match &features[0].geometry {
            Geometry::MultiPoint(points) => {
                let (lon, lat) = tile_pixel_to_lon_lat_exact(DEFAULT_EXTENT, &t, 8.0, 9.0);
                assert_abs_diff_eq!(points.0[1].x(), lon, epsilon = 1e-12);
                assert_abs_diff_eq!(points.0[1].y(), lat, epsilon = 1e-12);
            }
            other => panic!("expected multipoint, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_hole_fails() {
        let t = tile_435();
        let layer = tile::Layer {
            name: "data".to_string(),
            features: vec![tile::Feature {
                r#type: Some(GeomType::Polygon as i32),
                // (10,10) -> (10,30) -> (30,30) -> (30,10): counter-clockwise on screen
                geometry: vec![9, 20, 20, 26, 0, 40, 40, 0, 0, 39, 15],
                ..Default::default()
            }],
            extent: Some(DEFAULT_EXTENT),
            ..Default::default()
        };
        let bytes = Tile { layers: vec![layer] }.encode_to_vec();
        assert!(matches!(
            VectorTileDecoder::new().decode_all(&bytes, &t),
            Err(DecodeError::Geometry { feature: 0, .. })
        ));
    }

    #[test]
    fn test_corrupt_input_fails() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .polygon(&square_at(100, 100, 10), &[("v", 1.0)])
            .encode()
            .unwrap();

        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            VectorTileDecoder::new().decode_all(truncated, &t),
            Err(DecodeError::Protobuf(_))
        ));

        // Gzip magic followed by garbage
        assert!(matches!(
            VectorTileDecoder::new().decode_all(&[0x1f, 0x8b, 0x00, 0x01], &t),
            Err(DecodeError::Gzip(_))
        ));
    }

    #[test]
    fn test_malformed_geometry_and_tags_fail() {
        let t = tile_435();
        let bad_geometry = tile::Layer {
            name: "data".to_string(),
            features: vec![tile::Feature {
                r#type: Some(GeomType::Point as i32),
                geometry: vec![9, 20],
                ..Default::default()
            }],
            extent: Some(DEFAULT_EXTENT),
            ..Default::default()
        };
        let bytes = Tile {
            layers: vec![bad_geometry],
        }
        .encode_to_vec();
        assert!(matches!(
            VectorTileDecoder::new().decode_all(&bytes, &t),
            Err(DecodeError::Geometry { feature: 0, .. })
        ));

        let bad_tags = tile::Layer {
            name: "data".to_string(),
            keys: vec!["v".to_string()],
            features: vec![tile::Feature {
                r#type: Some(GeomType::Point as i32),
                tags: vec![0, 5],
                geometry: vec![9, 20, 20],
                ..Default::default()
            }],
            extent: Some(DEFAULT_EXTENT),
            ..Default::default()
        };
        let bytes = Tile { layers: vec![bad_tags] }.encode_to_vec();
        assert!(matches!(
            VectorTileDecoder::new().decode_all(&bytes, &t),
            Err(DecodeError::InvalidTags { .. })
        ));
    }

    #[test]
    fn test_zero_extent_fails() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .layer("data", 0)
            .point(1, 1, &[("v", 1.0)])
            .encode()
            .unwrap();
        assert!(matches!(
            VectorTileDecoder::new().decode_all(&bytes, &t),
            Err(DecodeError::ZeroExtent { .. })
        ));
    }

    #[test]
    fn test_geometry_is_unrounded_lon_lat() {
        let t = tile_435();
        let bytes = TileBuilder::new()
            .layer("data", DEFAULT_EXTENT)
            .point(123, 456, &[])
            .encode()
            .unwrap();
        let features = VectorTileDecoder::new().decode_all(&bytes, &t).unwrap();
        let (lon, lat) = tile_pixel_to_lon_lat_exact(DEFAULT_EXTENT, &t, 123.0, 456.0);
        match &features[0].geometry {
            Geometry::Point(p) => {
                assert_abs_diff_eq!(p.x(), lon, epsilon = 1e-12);
                assert_abs_diff_eq!(p.y(), lat, epsilon = 1e-12);
            }
            other => panic!("expected point, got {:?}", other),
        }
    }
}
