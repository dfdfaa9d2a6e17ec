//! Worker error types.

use dfscan_models::JobStatus;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} is not finished (status: {status})")]
    NotFinished { job_id: String, status: JobStatus },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("{0}")]
    NoFrames(String),

    #[error("Invalid analysis options: {0}")]
    InvalidOptions(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Worker task failed: {0}")]
    Join(String),

    #[error("Media error: {0}")]
    Media(#[from] dfscan_media::MediaError),

    #[error("Detector error: {0}")]
    Detector(#[from] dfscan_detector::DetectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    /// Whether the caller's request was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidOptions(_) | WorkerError::InvalidImage(_) | WorkerError::UnknownModel(_)
        )
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            Self::Join(format!("worker panicked: {}", e))
        } else {
            Self::Join(e.to_string())
        }
    }
}
