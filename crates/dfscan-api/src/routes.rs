//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{detect_image, get_job, get_job_result, get_keyframe, health, list_models, start_analysis};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let analysis_routes = Router::new()
        .route("/analyze", post(start_analysis))
        // Uploads are bounded by RequestBodyLimitLayer below
        .layer(DefaultBodyLimit::disable());

    let detect_routes = Router::new()
        .route("/detect", post(detect_image))
        .layer(DefaultBodyLimit::max(state.config.max_image_size));

    let job_routes = Router::new()
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/result", get(get_job_result))
        .route("/jobs/:job_id/keyframes/:n", get(get_keyframe));

    let api_routes = Router::new()
        .merge(analysis_routes)
        .merge(detect_routes)
        .merge(job_routes)
        .route("/models", get(list_models));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_video_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
