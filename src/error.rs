//! Error types for media sessions

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a streaming session
#[derive(Error, Debug)]
pub enum PacerError {
    /// The media file is missing, unreadable or has no usable track
    #[error("Failed to open media '{}': {reason}", path.display())]
    MediaOpenFailed { path: PathBuf, reason: String },

    /// The decoding layer failed while reading samples
    #[error("Decode error: {0}")]
    Decode(String),

    /// The resampler cannot convert between the given formats
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// A PCM buffer length is not a whole number of frames
    #[error("Audio buffer of {len} bytes is not aligned to {frame_bytes}-byte frames")]
    MisalignedAudio { len: usize, frame_bytes: usize },

    /// The resampler failed while processing a chunk
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, PacerError>;

impl PacerError {
    pub fn open_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MediaOpenFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<symphonia::core::errors::Error> for PacerError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
