//! Bearer token check for the operator API

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

/// Admits a request only when it carries `Authorization: Bearer <token>`
/// with the configured token
pub async fn auth_middleware(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = bearer_token(&request)?;

    if presented != expected {
        debug!(path = %request.uri().path(), "bearer token mismatch");
        return Err(AuthError::WrongToken);
    }

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::NoCredentials)?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::NotBearer)
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header (401)
    NoCredentials,

    /// A header that is not a bearer token (401)
    NotBearer,

    /// Well-formed bearer token that does not match (403)
    WrongToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::NoCredentials => (StatusCode::UNAUTHORIZED, "missing bearer token"),
            AuthError::NotBearer => (
                StatusCode::UNAUTHORIZED,
                "expected Authorization: Bearer <token>",
            ),
            AuthError::WrongToken => (StatusCode::FORBIDDEN, "invalid bearer token"),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
