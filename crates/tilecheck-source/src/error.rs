//! Error types for source dataset reading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a source dataset.
///
/// Every variant is fatal to the read: the reader yields the error once and
/// then stops.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The dataset file could not be opened.
    #[error("Failed to open '{path}': {source}")]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The delimited-text layer failed (I/O error mid-file, invalid UTF-8).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row could not be interpreted with the configured layout.
    #[error("Cannot parse row at line {line} ({reason}): {raw}")]
    RowParse {
        /// 1-based line number in the file.
        line: u64,
        /// The row as read, fields re-joined with the delimiter.
        raw: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The column layout is inconsistent.
    #[error("Invalid column layout: {0}")]
    InvalidLayout(String),

    /// The read was cancelled before reaching the end of the file.
    #[error("Read cancelled")]
    Cancelled,
}
