//! Single-image detection.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use dfscan_models::{ImageDetection, DEFAULT_THRESHOLD};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::handlers::analysis::{media_type, unsupported};
use crate::metrics;
use crate::state::AppState;

const IMAGE_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// Query parameters of `POST /api/detect`.
#[derive(Debug, Default, Deserialize)]
pub struct DetectQuery {
    pub threshold: Option<f64>,
    pub model: Option<String>,
}

/// Score one JPEG or PNG image (raw request body) and answer at once.
///
/// The size limit is enforced by the route's body limit.
pub async fn detect_image(
    State(state): State<AppState>,
    Query(query): Query<DetectQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ImageDetection>> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty image upload"));
    }
    let content_type = media_type(&headers).unwrap_or_default();
    if !IMAGE_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(unsupported(&content_type, "JPEG, PNG"));
    }

    let model = query.model.unwrap_or_else(|| state.default_model.clone());
    let threshold = query.threshold.unwrap_or(DEFAULT_THRESHOLD);
    let size = body.len();
    let detection = state.service.detect_image(body.to_vec(), &model, threshold).await?;
    metrics::record_upload(size);
    info!(
        model = %detection.model,
        bytes = size,
        verdict = %detection.verdict,
        "Image scored"
    );

    Ok(Json(detection))
}
