//! Audit log endpoint

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::EventsResponse,
};
use crate::storage::schema::EventType;

const DEFAULT_EVENTS_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    event_type: Option<String>,
    limit: Option<usize>,
}

/// GET /api/v1/events?event_type=&limit=
pub async fn list_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let event_type = query
        .event_type
        .as_deref()
        .map(str::parse::<EventType>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let events = state
        .coordinator
        .storage()
        .list_events(event_type, query.limit.unwrap_or(DEFAULT_EVENTS_LIMIT))
        .await?;

    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}
