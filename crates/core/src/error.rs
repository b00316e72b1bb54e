//! Error types for SpecMap

use thiserror::Error;

/// Main error type for SpecMap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band count mismatch: expected {expected} bands, got {actual}")]
    BandCountMismatch { expected: usize, actual: usize },

    #[error("Strategy '{strategy}' does not support {traversal} traversal")]
    UnsupportedTraversal {
        strategy: &'static str,
        traversal: String,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Iteration fault: {0}")]
    IterationFault(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Spectral library error: {0}")]
    Library(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`]
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error is raised by configuration checks before any pixel is processed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::BandCountMismatch { .. }
                | Error::UnsupportedTraversal { .. }
                | Error::InvalidParameter { .. }
                | Error::SizeMismatch { .. }
                | Error::InvalidDimensions { .. }
        )
    }
}

/// Result type alias for SpecMap operations
pub type Result<T> = std::result::Result<T, Error>;
