//! Job polling, results and keyframes.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use dfscan_media::keyframe::keyframe_relative_path;
use dfscan_models::{AnalysisResult, JobId, JobSnapshot};
use dfscan_worker::JobPaths;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Poll a job: status, progress, stage, message and, once completed, the result.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.service.poll(&JobId::from_string(job_id)).await?;
    Ok(Json(snapshot))
}

/// The analysis result of a completed job.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AnalysisResult>> {
    let result = state.service.get_result(&JobId::from_string(job_id)).await?;
    Ok(Json(result))
}

/// Keyframe image of the 1-based segment `n`.
pub async fn get_keyframe(
    State(state): State<AppState>,
    Path((job_id, n)): Path<(String, usize)>,
) -> ApiResult<impl IntoResponse> {
    let id = JobId::from_string(job_id);
    if !id.is_path_safe() || n == 0 {
        return Err(ApiError::not_found("Keyframe"));
    }

    let paths = JobPaths::new(&state.service.config().data_dir, &id);
    let path = paths.root().join(keyframe_relative_path(n));
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found(format!("Keyframe {} of job {}", n, id)))
        }
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}
