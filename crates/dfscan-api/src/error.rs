//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dfscan_worker::WorkerError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkerError> for ApiError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::JobNotFound(id) => ApiError::NotFound(format!("Job {}", id)),
            WorkerError::NotFinished { .. } | WorkerError::JobFailed(_) => ApiError::Conflict(e.to_string()),
            WorkerError::NoFrames(message) => ApiError::Unprocessable(message),
            WorkerError::InvalidOptions(_) | WorkerError::InvalidImage(_) | WorkerError::UnknownModel(_) => {
                ApiError::BadRequest(e.to_string())
            }
            WorkerError::QueueFull | WorkerError::QueueClosed => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfscan_models::JobStatus;

    #[test]
    fn test_worker_error_status_codes() {
        let cases = [
            (WorkerError::job_not_found("x"), StatusCode::NOT_FOUND),
            (
                WorkerError::NotFinished {
                    job_id: "x".to_string(),
                    status: JobStatus::Processing,
                },
                StatusCode::CONFLICT,
            ),
            (WorkerError::NoFrames("No frames processed".to_string()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkerError::UnknownModel("nope".to_string()), StatusCode::BAD_REQUEST),
            (WorkerError::InvalidImage("truncated".to_string()), StatusCode::BAD_REQUEST),
            (WorkerError::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
            (WorkerError::store("disk full"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }
}
