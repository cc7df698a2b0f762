//! Error types for the vector tile crate.

use thiserror::Error;

/// Errors that can occur while decoding a vector tile.
///
/// Any of these aborts the decode of the whole tile; no partial feature list
/// is ever returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The gzip wrapper around the tile could not be inflated.
    #[error("Failed to inflate gzip tile: {0}")]
    Gzip(#[from] std::io::Error),

    /// The protobuf container is corrupt or truncated.
    #[error("Failed to decode tile protobuf: {0}")]
    Protobuf(String),

    /// A layer declared a zero extent.
    #[error("Layer '{layer}' declares a zero extent")]
    ZeroExtent {
        /// Layer name.
        layer: String,
    },

    /// A feature's geometry command stream is malformed.
    #[error("Malformed geometry in layer '{layer}' feature #{feature}: {reason}")]
    Geometry {
        /// Layer name.
        layer: String,
        /// Position of the feature within its layer.
        feature: usize,
        /// What was wrong with the command stream.
        reason: String,
    },

    /// A feature's tags reference keys or values the layer does not have.
    #[error("Invalid tags in layer '{layer}' feature #{feature}: {reason}")]
    InvalidTags {
        /// Layer name.
        layer: String,
        /// Position of the feature within its layer.
        feature: usize,
        /// What was wrong with the tags.
        reason: String,
    },
}

/// Errors returned by a feature lookup backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// The backend could not answer a query for this coordinate.
    #[error("Lookup unavailable at ({lon}, {lat}): {reason}")]
    LookupUnavailable {
        /// Queried longitude.
        lon: f64,
        /// Queried latitude.
        lat: f64,
        /// Why the lookup failed.
        reason: String,
    },
}
