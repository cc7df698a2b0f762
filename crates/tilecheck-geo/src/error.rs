//! Error types for the geo crate.

use thiserror::Error;

/// Errors that can occur when addressing tiles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    /// The zoom level or column/row is outside the slippy-map range.
    #[error("Invalid tile address z={z} x={x} y={y} (zoom must be at most {max_zoom}, x and y below 2^z)")]
    InvalidTileAddress {
        /// Zoom level.
        z: u32,
        /// X tile coordinate.
        x: u32,
        /// Y tile coordinate.
        y: u32,
        /// Largest accepted zoom level.
        max_zoom: u8,
    },

    /// A textual tile address could not be parsed.
    #[error("Cannot parse tile address '{0}' (expected z/x/y)")]
    Unparseable(String),
}
