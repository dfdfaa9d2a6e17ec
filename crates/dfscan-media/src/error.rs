//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Video source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Decoder stalled: no frame within {timeout:?} after {frames} frames")]
    DecodeTimeout { frames: u64, timeout: Duration },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("No frames processed")]
    EmptyTimeline,

    #[error("Failed to persist keyframe {path}: {message}")]
    KeyframePersist { path: PathBuf, message: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    /// Create a source-unreadable error.
    pub fn source_unreadable(message: impl Into<String>) -> Self {
        Self::SourceUnreadable(message.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a keyframe persistence error.
    pub fn keyframe_persist(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::KeyframePersist {
            path: path.into(),
            message: message.into(),
        }
    }
}
