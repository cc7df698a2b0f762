//! Conversions between tile-local pixels and longitude/latitude.
//!
//! Vector tile geometry is expressed in an integer grid of `extent` units per
//! tile side. The pixel-to-geographic conversion follows the formula used by
//! common vector tile query libraries so that coordinates derived here line up
//! with coordinates derived from the same tiles elsewhere.

use crate::{BoundingBox, TileAddress};
use std::f64::consts::PI;

/// Extent used by most tiling pipelines when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Geographic footprint of a tile (Web Mercator, inverse slippy-map formula).
pub fn tile_bounding_box(tile: &TileAddress) -> BoundingBox {
    let n = tile.tiles_per_axis() as f64;
    let x = tile.x() as f64;
    let y = tile.y() as f64;

    let min_lon = x / n * 360.0 - 180.0;
    let max_lon = (x + 1.0) / n * 360.0 - 180.0;

    let max_lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    let min_lat = (PI * (1.0 - 2.0 * (y + 1.0) / n)).sinh().atan().to_degrees();

    BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
}

/// Convert a tile-local pixel position to longitude/latitude without rounding.
pub fn tile_pixel_to_lon_lat_exact(extent: u32, tile: &TileAddress, px: f64, py: f64) -> (f64, f64) {
    let z2 = tile.tiles_per_axis() as f64;
    let extent = extent as f64;
    let size = extent * z2;
    let x0 = extent * tile.x() as f64;
    let y0 = extent * tile.y() as f64;

    let lon_ratio_y = 180.0 - (py + y0) * 360.0 / size;
    let lon = (px + x0) * 360.0 / size - 180.0;
    let lat = (360.0 / PI) * (lon_ratio_y * PI / 180.0).exp().atan() - 90.0;

    (lon, lat)
}

/// Convert a tile-local pixel position to longitude/latitude, rounded to one
/// decimal digit.
///
/// The rounding makes the result usable as a join key against source points
/// bucketed at the same precision.
pub fn tile_pixel_to_lon_lat(extent: u32, tile: &TileAddress, px: f64, py: f64) -> (f64, f64) {
    let (lon, lat) = tile_pixel_to_lon_lat_exact(extent, tile, px, py);
    (round_to_tenth(lon), round_to_tenth(lat))
}

/// Inverse of [`tile_pixel_to_lon_lat_exact`]: position of a coordinate in
/// the pixel grid of `tile`. The result may fall outside `0..extent` when
/// the coordinate lies outside the tile.
pub fn lon_lat_to_tile_pixel(extent: u32, tile: &TileAddress, lon: f64, lat: f64) -> (f64, f64) {
    let z2 = tile.tiles_per_axis() as f64;
    let extent = extent as f64;
    let size = extent * z2;
    let x0 = extent * tile.x() as f64;
    let y0 = extent * tile.y() as f64;

    let px = (lon + 180.0) * size / 360.0 - x0;
    let lon_ratio_y = (180.0 / PI) * ((lat + 90.0) * PI / 360.0).tan().ln();
    let py = (180.0 - lon_ratio_y) * size / 360.0 - y0;

    (px, py)
}

/// Inclusive range test on both axes.
pub fn is_in_bounding_box(lon: f64, lat: f64, bbox: &BoundingBox) -> bool {
    bbox.contains(lon, lat)
}

/// Round to one decimal digit, normalising `-0.0` to `0.0`.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0 + 0.0
}
