//! Monitoring endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{ConfigureResponse, ResultsResponse},
};
use crate::coordinator::{
    CycleTrigger, DEFAULT_STATS_WINDOW_HOURS, MonitoringConfigPatch, RunSummary,
};
use crate::storage::schema::{CheckResult, EndpointId, MonitoringStats};

const DEFAULT_RESULTS_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    hours: Option<i64>,
}

/// POST /api/v1/monitoring/run
///
/// Runs one manual cycle and waits for it to finish
pub async fn run_monitoring(State(state): State<ApiState>) -> ApiResult<Json<RunSummary>> {
    let summary = state.coordinator.run_cycle(CycleTrigger::Manual).await?;
    Ok(Json(summary))
}

/// POST /api/v1/monitoring/test/:id
pub async fn test_endpoint(
    State(state): State<ApiState>,
    Path(endpoint_id): Path<EndpointId>,
) -> ApiResult<Json<CheckResult>> {
    let result = state.coordinator.test_one(endpoint_id).await?;
    Ok(Json(result))
}

/// PUT /api/v1/monitoring/config/:id
pub async fn configure_monitoring(
    State(state): State<ApiState>,
    Path(endpoint_id): Path<EndpointId>,
    Json(patch): Json<MonitoringConfigPatch>,
) -> ApiResult<Json<ConfigureResponse>> {
    let (config_id, config) = state.coordinator.configure(endpoint_id, patch).await?;

    Ok(Json(ConfigureResponse {
        success: true,
        config_id,
        config,
        message: "Monitoring configuration updated".to_string(),
    }))
}

/// GET /api/v1/monitoring/results/:id?limit=
pub async fn get_results(
    State(state): State<ApiState>,
    Path(endpoint_id): Path<EndpointId>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Json<ResultsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_RESULTS_LIMIT);
    let (endpoint, results) = state.coordinator.results(endpoint_id, limit).await?;

    Ok(Json(ResultsResponse { endpoint, results }))
}

/// GET /api/v1/monitoring/stats?hours=
///
/// Aggregates over the last 24 hours unless `hours` says otherwise
pub async fn get_stats(
    State(state): State<ApiState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<MonitoringStats>> {
    let hours = query.hours.unwrap_or(DEFAULT_STATS_WINDOW_HOURS);
    let stats = state.coordinator.stats(hours).await?;
    Ok(Json(stats))
}
