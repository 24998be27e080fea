//! Mapping of engine errors to HTTP responses
//!
//! Every error body has the shape `{"error": "<message>"}`. Storage faults
//! are logged here so handlers can propagate them with `?`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::coordinator::CoordinatorError;
use crate::storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Storage(StorageError),

    /// Malformed query parameter or rejected monitoring config
    BadRequest(String),

    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(StorageError::ConnectionFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Storage(err) => {
                error!("request failed on storage: {}", err);
                err.to_string()
            }
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Storage(err) => ApiError::Storage(err),
            CoordinatorError::EndpointNotFound(id) => {
                ApiError::NotFound(format!("Endpoint not found: {id}"))
            }
            CoordinatorError::InvalidConfig(msg) => ApiError::BadRequest(msg),
        }
    }
}
