//! Tile addresses and geographic bounding boxes.

use crate::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted zoom level.
///
/// At zoom 30 the tile count per axis still fits in a `u32`, and
/// `extent * 2^z` stays exactly representable in an `f64` for any
/// realistic extent.
pub const MAX_ZOOM: u8 = 30;

/// OSM-style tile address (z, x, y).
///
/// A `TileAddress` can only be built through [`TileAddress::new`] (or the
/// conversions that call it), so `x` and `y` are always below `2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileAddress {
    z: u8,
    x: u32,
    y: u32,
}

impl TileAddress {
    /// Create a tile address, checking the indices against the zoom level.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(Self::invalid(z as u32, x, y));
        }
        let max_coord = 1u64 << z;
        if x as u64 >= max_coord || y as u64 >= max_coord {
            return Err(Self::invalid(z as u32, x, y));
        }
        Ok(Self { z, x, y })
    }

    fn invalid(z: u32, x: u32, y: u32) -> GeoError {
        GeoError::InvalidTileAddress {
            z,
            x,
            y,
            max_zoom: MAX_ZOOM,
        }
    }

    /// Zoom level.
    pub fn z(&self) -> u8 {
        self.z
    }

    /// Column, 0 at 180°W, increasing eastward.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Row, 0 at ~85.05°N, increasing southward.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.z
    }

    /// Find the tile containing a longitude/latitude at zoom `z`.
    ///
    /// Uses the OpenStreetMap Slippy Map tiling formula:
    /// - x = floor((lon + 180) / 360 * 2^z)
    /// - y = floor((1 - ln(tan(lat) + sec(lat)) / π) / 2 * 2^z)
    pub fn from_lon_lat(lon: f64, lat: f64, z: u8) -> Result<Self> {
        if z > MAX_ZOOM || !lon.is_finite() || !lat.is_finite() {
            return Err(Self::invalid(z as u32, 0, 0));
        }

        // The exact Web Mercator limit is ±85.0511287798° (arctan(sinh(π)))
        let lat_clamped = lat.clamp(-85.051_128_779_8, 85.051_128_779_8);
        let n = (1u64 << z) as f64;

        let x = ((lon + 180.0) / 360.0 * n).floor();
        let lat_rad = lat_clamped.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0
            * n)
            .floor();

        // Clamp to valid range (handles edge cases at exactly ±180°)
        let max_coord = n - 1.0;
        let x = x.clamp(0.0, max_coord) as u32;
        let y = y.clamp(0.0, max_coord) as u32;

        Self::new(z, x, y)
    }

    /// Cache file name used by tiling services: `{prefix}-{z}-{x}-{y}.mvt`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}-{}-{}-{}.mvt", prefix, self.z, self.x, self.y)
    }
}

impl TryFrom<[u32; 3]> for TileAddress {
    type Error = GeoError;

    /// Convert a `[z, x, y]` triple, the layout used in configuration files.
    fn try_from(value: [u32; 3]) -> Result<Self> {
        let [z, x, y] = value;
        let z8 = u8::try_from(z).map_err(|_| Self::invalid(z, x, y))?;
        Self::new(z8, x, y)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileAddress {
    type Err = GeoError;

    /// Parse `z/x/y` (also accepts `z-x-y` and `z,x,y`).
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(&['/', '-', ','][..]).collect();
        if parts.len() != 3 {
            return Err(GeoError::Unparseable(s.to_string()));
        }
        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| GeoError::Unparseable(s.to_string()))?;
        }
        Self::try_from(values)
    }
}

impl<'de> Deserialize<'de> for TileAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = <[u32; 3]>::deserialize(deserializer)?;
        Self::try_from(values).map_err(serde::de::Error::custom)
    }
}

/// Axis-aligned geographic bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create bounds from `[min_lon, min_lat, max_lon, max_lat]` values.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Check if a coordinate is within the bounds (edges included).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Geographic midpoint of the box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Bounds as `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}, {:.6}, {:.6}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
