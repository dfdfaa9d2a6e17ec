//! Detector error types.

use thiserror::Error;

/// Result type for detector operations.
pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model weights not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Inference runtime error: {0}")]
    Runtime(String),
}

impl DetectorError {
    pub fn invocation(msg: impl Into<String>) -> Self {
        Self::ModelInvocation(msg.into())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}
