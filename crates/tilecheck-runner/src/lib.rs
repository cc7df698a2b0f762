//! Batch validation of vector tilesets against their source datasets.
//!
//! A [`ValidationConfig`] names one or more datasets, the tiles built from
//! each, and the strategy to check them with. A [`Runner`] fetches tiles
//! through a [`TileProvider`] and validates them concurrently:
//!
//! ```no_run
//! use tilecheck_runner::{DirectoryTileProvider, Runner, ValidationConfig};
//!
//! let config = ValidationConfig::from_file("check.yaml")?;
//! let runner = Runner::new(DirectoryTileProvider::new(&config.tiles_dir)).jobs(config.jobs);
//! let report = runner.run(&config)?;
//! for tile in report.tiles() {
//!     print!("{}", tile.text(None));
//! }
//! # Ok::<(), tilecheck_runner::RunError>(())
//! ```

mod config;
mod error;
mod provider;
mod run;

pub use config::{CoordinateColumns, DatasetConfig, PointQuerySettings, ValidationConfig};
pub use error::{ProviderError, RunError, TileError};
pub use provider::{DirectoryTileProvider, TileProvider, DEFAULT_CACHE_SIZE};
pub use run::{BatchReport, DatasetReport, Runner, TileCallback, TileOutcome, TileStatus};

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunError>;
