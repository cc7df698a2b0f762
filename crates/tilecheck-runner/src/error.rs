//! Error types for the batch runner.

use std::path::PathBuf;
use thiserror::Error;
use tilecheck_geo::GeoError;
use tilecheck_mvt::DecodeError;
use tilecheck_source::SourceError;

/// Errors that abort the whole batch.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    ConfigIo {
        /// Configuration path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// The configuration parsed but is inconsistent.
    #[error("Invalid config: {0}")]
    Config(String),

    /// A dataset named on the command line is not configured.
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    /// The source dataset could not be read. Every tile reads the same file,
    /// so the batch stops here.
    #[error("Source data error: {0}")]
    Source(SourceError),

    /// A report could not be rendered.
    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    /// The worker pool could not be built.
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),

    /// The run was cancelled.
    #[error("Run cancelled")]
    Cancelled,
}

impl From<SourceError> for RunError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Cancelled => RunError::Cancelled,
            other => RunError::Source(other),
        }
    }
}

/// Errors fetching a tile from a [`TileProvider`](crate::TileProvider).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The tile is not present in the cache directory.
    #[error("Tile file not found: {}", path.display())]
    NotFound {
        /// Expected tile path.
        path: PathBuf,
    },

    /// The tile file exists but could not be read.
    #[error("Failed to read tile '{}': {source}", path.display())]
    Io {
        /// Tile path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("Tile cache lock was poisoned")]
    CacheLockPoisoned,
}

/// Errors confined to a single tile. The batch records them and moves on.
#[derive(Debug, Error)]
pub enum TileError {
    /// The configured tile address is out of range.
    #[error(transparent)]
    InvalidTile(#[from] GeoError),

    /// The tile could not be fetched.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The tile bytes could not be decoded.
    #[error("Tile decode error: {0}")]
    Decode(#[from] DecodeError),
}
