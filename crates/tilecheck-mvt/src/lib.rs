//! # tilecheck-mvt
//!
//! Decoding of Mapbox Vector Tiles into validation features.
//!
//! A vector tile is a protobuf message holding named layers. Each layer
//! declares its own integer `extent` and a list of features; each feature has
//! a geometry encoded as a command stream and a set of key/value tags.
//!
//! This crate provides:
//! - [`VectorTileDecoder`]: turns a tile buffer (optionally gzip-compressed)
//!   into [`TileFeature`] records. Every feature gets a representative point,
//!   the centre of its bounding rectangle, projected to longitude/latitude
//!   and rounded to one decimal.
//! - [`TileIndex`]: an R-tree over the decoded geometries that answers
//!   "which feature is at this coordinate" queries.
//! - [`TileBuilder`]: a minimal encoder for synthesising fixture tiles.
//!
//! ## Example
//!
//! ```no_run
//! use tilecheck_geo::{tile_bounding_box, TileAddress};
//! use tilecheck_mvt::{QueryOptions, TileIndex, VectorTileDecoder, FeatureLookup};
//!
//! let bytes = std::fs::read("tiles/probablefutures.40206-west-v3-4-3-5.mvt")?;
//! let tile = TileAddress::new(4, 3, 5)?;
//! let decoder = VectorTileDecoder::new();
//!
//! // Features whose representative point is inside the tile footprint
//! let features = decoder.decode(&bytes, &tile, &tile_bounding_box(&tile))?;
//! println!("{} features", features.len());
//!
//! // Point lookups against every decoded geometry
//! let index = TileIndex::new(decoder.decode_all(&bytes, &tile)?);
//! let hits = index.lookup(-100.0, 45.0, &QueryOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod decoder;
mod error;
mod geometry;
mod index;

pub use builder::TileBuilder;
pub use decoder::{TileFeature, VectorTileDecoder};
pub use error::{DecodeError, LookupError};
pub use geometry::GeometryKind;
pub use index::{
    FeatureLookup, QueryHit, QueryOptions, TileIndex, DEFAULT_QUERY_LIMIT, DEFAULT_QUERY_RADIUS,
};

/// Result type for tile decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
