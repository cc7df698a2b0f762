//! # tilecheck-validate
//!
//! Compares what a vector tile renders against the source observations it
//! was built from.
//!
//! ## Overview
//!
//! Two strategies are available, selected per run with [`Strategy`]:
//!
//! - [`aggregate_comparison`]: buckets both point sets by one-decimal
//!   latitude ([`LatitudeAggregator`]), averages every attribute per bucket
//!   and compares the means. Fast, needs no spatial index, and reports
//!   failing latitudes.
//! - [`point_query_comparison`]: looks every source point up in the tile
//!   through a [`FeatureLookup`](tilecheck_mvt::FeatureLookup) backend and
//!   compares the fields one by one. Slower, but reports the failing rows.
//!
//! Both return a [`ValidationResult`], which [`ReportBuilder`] renders as
//! text or JSON.
//!
//! ## Example
//!
//! ```no_run
//! use tilecheck_geo::{tile_bounding_box, TileAddress};
//! use tilecheck_mvt::VectorTileDecoder;
//! use tilecheck_source::{ColumnLayout, DatasetUnit, ReadOptions, SourceReader};
//! use tilecheck_validate::{aggregate_comparison, ReportBuilder};
//!
//! let tile = TileAddress::new(4, 3, 5)?;
//! let bbox = tile_bounding_box(&tile);
//! let layout = ColumnLayout::new(2, 1).with_attribute("data_1c_mid", 5);
//!
//! let source = SourceReader::open("data.csv", bbox, &layout, ReadOptions::new(DatasetUnit::Days.default_policy()))?
//!     .collect::<Result<Vec<_>, _>>()?;
//! let bytes = std::fs::read("tiles/west-4-3-5.mvt")?;
//! let features = VectorTileDecoder::new().decode(&bytes, &tile, &bbox)?;
//!
//! let result = aggregate_comparison(&source, &features, &layout.attribute_names(), true);
//! print!("{}", ReportBuilder::new("west-4-3-5").text(&result));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod aggregate;
mod error;
mod report;
mod result;
mod strategy;

pub use aggregate::{AggregateRow, BucketPoint, LatKey, LatitudeAggregator, LatitudeBuckets};
pub use error::ValidateError;
pub use report::ReportBuilder;
pub use result::{Mismatch, MismatchKey, Unchecked, ValidationResult, Verdict};
pub use strategy::{
    aggregate_comparison, compare_aggregates, point_query_comparison, PointQueryOptions, Progress,
    ProgressCallback, Strategy, DEFAULT_PROGRESS_EVERY,
};

/// Result type for validation runs.
pub type Result<T> = std::result::Result<T, ValidateError>;
