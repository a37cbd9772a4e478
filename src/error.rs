//! Error types for codec-bench operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for codec-bench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while benchmarking codecs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Error raised by a codec hook (preprocess, encode, persist, restore, compare).
    #[error("Codec error ({codec}): {message}")]
    Codec {
        /// Codec identifier.
        codec: String,
        /// Error message from the codec.
        message: String,
    },

    /// Sample buffer length does not match the declared image shape.
    #[error("Shape mismatch: {height}x{width}x{channels} needs {expected} samples, got {actual}")]
    ShapeMismatch {
        /// Image height.
        height: usize,
        /// Image width.
        width: usize,
        /// Channel count.
        channels: usize,
        /// Expected sample count (H*W*C), `usize::MAX` if that product overflows.
        expected: usize,
        /// Actual sample count.
        actual: usize,
    },

    /// An image with zero elements cannot be benchmarked.
    #[error("Empty image: {height}x{width}x{channels}")]
    EmptyImage {
        /// Image height.
        height: usize,
        /// Image width.
        width: usize,
        /// Channel count.
        channels: usize,
    },

    /// A model produced no measurements, so its means are undefined.
    #[error("No measurements recorded for model {model}")]
    NoMeasurements {
        /// Model name.
        model: String,
    },

    /// The named model is not registered.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The scratch slot already holds an artifact when a new one is about to be written.
    #[error("Scratch slot occupied: {}", path.display())]
    ScratchOccupied {
        /// Path of the stale artifact.
        path: PathBuf,
    },

    /// Dataset could not be produced.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error rendering or writing a report or chart.
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a codec hook failure.
    pub fn codec(codec: impl Into<String>, message: impl ToString) -> Self {
        Self::Codec {
            codec: codec.into(),
            message: message.to_string(),
        }
    }
}
