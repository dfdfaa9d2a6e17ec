//! Video submission.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use dfscan_models::{AnalysisOptions, JobId, JobStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Query parameters of `POST /api/analyze`.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Frames per second to analyze
    pub fps: Option<f64>,
    pub threshold: Option<f64>,
    pub model: Option<String>,
    /// Original file name, used for its extension
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Accept a video upload (raw request body) and start an analysis job.
pub async fn start_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AnalyzeResponse>)> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty video upload"));
    }
    let content_type = media_type(&headers).unwrap_or_default();
    let type_extension = if content_type == GENERIC_BINARY {
        None
    } else {
        let extension = extension_for_content_type(&content_type);
        Some(extension.ok_or_else(|| unsupported(&content_type, "MP4, MOV, WebM, AVI, MKV"))?)
    };

    let mut options = AnalysisOptions::default().with_model(query.model.unwrap_or_else(|| state.default_model.clone()));
    if let Some(fps) = query.fps {
        options = options.with_target_fps(fps);
    }
    if let Some(threshold) = query.threshold {
        options = options.with_threshold(threshold);
    }

    let extension = query
        .filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .or(type_extension);

    let size = body.len();
    let job_id = state.service.submit_analysis(&body, extension, options).await?;
    metrics::record_upload(size);
    info!(job_id = %job_id, bytes = size, "Video accepted for analysis");

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            job_id,
            status: JobStatus::Processing,
        }),
    ))
}

/// Accepted for any container; the extension then comes from `filename`.
const GENERIC_BINARY: &str = "application/octet-stream";

/// The request's media type, lowercased and without parameters.
pub(crate) fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    Some(value.split(';').next()?.trim().to_ascii_lowercase())
}

pub(crate) fn unsupported(content_type: &str, allowed: &str) -> ApiError {
    let received = if content_type.is_empty() {
        "missing content type"
    } else {
        content_type
    };
    ApiError::unsupported_media_type(format!("{}. Allowed: {}", received, allowed))
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-msvideo" => Some("avi"),
        "video/x-matroska" => Some("mkv"),
        _ => None,
    }
}
