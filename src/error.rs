//! Error types for the segmentation library.
//!
//! Only the edges of the library produce errors: ingestion of upstream OCR
//! output, configuration validation and file/image loading. The layout
//! algorithms themselves are total and never fail on degenerate geometry.

/// Result type alias for segmentation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while ingesting or segmenting pages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single text fragment violates the input contract
    #[error("Invalid fragment at index {index}: {reason}")]
    InvalidFragment {
        /// Position of the fragment in its input list
        index: usize,
        /// Reason the fragment was rejected
        reason: String,
    },

    /// The input document does not have a recognized shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
