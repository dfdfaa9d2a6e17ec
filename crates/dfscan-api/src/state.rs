//! Application state.

use std::sync::Arc;

use dfscan_worker::AnalysisService;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<AnalysisService>,
    /// Model used when a request names none
    pub default_model: String,
}

impl AppState {
    pub fn new(config: ApiConfig, service: Arc<AnalysisService>, default_model: impl Into<String>) -> Self {
        Self {
            config,
            service,
            default_model: default_model.into(),
        }
    }
}
