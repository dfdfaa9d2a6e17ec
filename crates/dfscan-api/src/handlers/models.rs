use axum::extract::State;
use axum::Json;
use dfscan_models::ModelInfo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<ModelInfo>,
}

/// List the detection models and whether their weights are installed.
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default_model: state.default_model.clone(),
        models: state.service.list_models(),
    })
}
