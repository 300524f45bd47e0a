//! Error types for cutframe.

use thiserror::Error;

/// Main error type for cutframe operations.
#[derive(Error, Debug)]
pub enum CutframeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Timeline error: {0}")]
    Timeline(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for cutframe operations.
pub type Result<T> = std::result::Result<T, CutframeError>;
