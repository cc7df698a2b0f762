//! # tilecheck-geo
//!
//! Tile addressing and coordinate conversion for vector tile validation.
//!
//! This crate converts between three coordinate spaces:
//! - Slippy-map tile indices (`z/x/y`, OpenStreetMap convention)
//! - Tile-local pixel coordinates (`0..extent` inside one tile)
//! - Geographic longitude/latitude in degrees (Web Mercator)
//!
//! ## Tile Coordinate System
//!
//! - `z` is the zoom level (0-30)
//! - `x` is the column (0 to 2^z - 1, from west to east)
//! - `y` is the row (0 to 2^z - 1, from north to south)
//!
//! ## Example
//!
//! ```
//! use tilecheck_geo::{tile_bounding_box, tile_pixel_to_lon_lat, TileAddress};
//!
//! let tile = TileAddress::new(4, 3, 5)?;
//! let bbox = tile_bounding_box(&tile);
//! assert_eq!(bbox.min_lon, -112.5);
//!
//! // Centre of the tile in a 4096 extent, rounded to one decimal.
//! let (lon, lat) = tile_pixel_to_lon_lat(4096, &tile, 2048.0, 2048.0);
//! assert!(bbox.contains(lon, lat));
//! # Ok::<(), tilecheck_geo::GeoError>(())
//! ```

mod error;
mod projection;
mod tile;

pub use error::GeoError;
pub use projection::{
    is_in_bounding_box, lon_lat_to_tile_pixel, round_to_tenth, tile_bounding_box,
    tile_pixel_to_lon_lat, tile_pixel_to_lon_lat_exact, DEFAULT_EXTENT,
};
pub use tile::{BoundingBox, TileAddress, MAX_ZOOM};

/// Result type for tile addressing operations.
pub type Result<T> = std::result::Result<T, GeoError>;
