//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video submission and job polling over [`dfscan_worker::AnalysisService`]
//! - Synchronous single-image detection
//! - Result, keyframe and model catalog endpoints
//! - Request logging, CORS and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
