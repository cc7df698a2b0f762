//! # tilecheck-source
//!
//! Streaming access to the authoritative dataset that tiles are validated
//! against: a delimited text file with one observation per row.
//!
//! A [`ColumnLayout`] says where the coordinates and each attribute live.
//! Coordinates come either from two numeric columns or from a single
//! `(lon,lat)` column (selected by giving both coordinates the same index).
//! Attribute values are coerced with the dataset's [`ValuePolicy`], which
//! replays the rounding the tiling pipeline applied on ingest.
//!
//! ```no_run
//! use tilecheck_geo::{tile_bounding_box, TileAddress};
//! use tilecheck_source::{ColumnLayout, DatasetUnit, ReadOptions, SourceReader};
//!
//! let layout = ColumnLayout::new(2, 1).with_attribute("data_1c_mid", 5);
//! let bbox = tile_bounding_box(&TileAddress::new(4, 3, 5)?);
//! let options = ReadOptions::new(DatasetUnit::Celsius.default_policy());
//!
//! for point in SourceReader::open("data/40206.csv", bbox, &layout, options)? {
//!     let point = point?;
//!     println!("{} {} {:?}", point.lon, point.lat, point.value("data_1c_mid"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cancel;
mod error;
mod layout;
mod reader;
mod unit;

pub use cancel::CancelFlag;
pub use error::SourceError;
pub use layout::{AttributeColumn, ColumnLayout};
pub use reader::{ReadOptions, SourcePoint, SourceReader, SourceRecord};
pub use unit::{DatasetUnit, ValuePolicy};

/// Result type for source reading.
pub type Result<T> = std::result::Result<T, SourceError>;
