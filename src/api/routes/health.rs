//! Health check endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Reports storage health and whether a monitoring cycle is running
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let storage = state.coordinator.storage().health_check().await?;

    Ok(Json(HealthResponse {
        status: if storage.healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage_healthy: storage.healthy,
        storage_message: storage.message,
        monitoring_running: state.coordinator.is_running(),
    }))
}
