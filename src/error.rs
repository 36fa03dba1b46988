//! Custom error types for manifold-montage.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the manifold-montage library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The manifold does not provide exactly one row per image.
    #[error("manifold has {rows} rows but the store holds {images} images")]
    ManifoldMismatch { images: usize, rows: usize },

    /// The image collection handed to the store cannot be used.
    #[error("invalid image collection: {reason}")]
    InvalidImages { reason: String },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Shape mismatch between arrays.
    #[error("array shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Malformed row in a manifest file.
    #[error("invalid manifest {path} at line {line}: {reason}")]
    Manifest {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for manifold-montage operations.
pub type Result<T> = std::result::Result<T, Error>;
