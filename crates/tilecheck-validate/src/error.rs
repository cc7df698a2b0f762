//! Error types for validation runs.

use thiserror::Error;

/// Errors that can end a validation run.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The run was cancelled; no partial result is produced.
    #[error("Validation cancelled")]
    Cancelled,
}
