//! Alert endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{AlertsResponse, ResolveAllResponse, ResolveResponse},
};
use crate::storage::schema::{AlertId, EndpointId};

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    endpoint_id: Option<EndpointId>,
}

/// GET /api/v1/alerts?endpoint_id=
///
/// Unresolved alerts, newest first
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<AlertsResponse>> {
    let alerts = state.coordinator.alerts().list_active(query.endpoint_id).await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// POST /api/v1/alerts/:id/resolve
pub async fn resolve_alert(
    State(state): State<ApiState>,
    Path(alert_id): Path<AlertId>,
) -> ApiResult<Json<ResolveResponse>> {
    let success = state.coordinator.alerts().resolve_alert(alert_id).await?;
    Ok(Json(ResolveResponse { success }))
}

/// POST /api/v1/alerts/resolve-all
pub async fn resolve_all_alerts(
    State(state): State<ApiState>,
) -> ApiResult<Json<ResolveAllResponse>> {
    let resolved = state.coordinator.alerts().resolve_all().await?;

    Ok(Json(ResolveAllResponse {
        success: true,
        resolved,
    }))
}
