//! REST API for operating the monitoring engine
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/monitoring/run` - Run one monitoring cycle now
//! - `POST /api/v1/monitoring/test/:id` - Check a single endpoint
//! - `PUT /api/v1/monitoring/config/:id` - Update an endpoint's monitoring config
//! - `GET /api/v1/monitoring/results/:id` - Recent check results
//! - `GET /api/v1/monitoring/stats` - Aggregate statistics
//! - `GET /api/v1/alerts` - Open alerts
//! - `POST /api/v1/alerts/:id/resolve` - Resolve one alert
//! - `POST /api/v1/alerts/resolve-all` - Resolve every open alert
//! - `GET /api/v1/events` - Audit log

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;
use crate::util;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    pub auth_token: Option<String>,

    /// Enable CORS for dashboards served from another origin
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((util::DEFAULT_ADDR, util::DEFAULT_PORT)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

impl TryFrom<&ApiSettings> for ApiConfig {
    type Error = anyhow::Error;

    fn try_from(settings: &ApiSettings) -> anyhow::Result<Self> {
        let bind_addr = settings
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {e}", settings.bind_addr))?;

        Ok(Self {
            bind_addr,
            auth_token: settings.auth_token.clone(),
            enable_cors: settings.enable_cors,
        })
    }
}

/// Build the router with every route and the configured layers
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/monitoring/run",
            post(routes::monitoring::run_monitoring),
        )
        .route(
            "/api/v1/monitoring/test/:id",
            post(routes::monitoring::test_endpoint),
        )
        .route(
            "/api/v1/monitoring/config/:id",
            put(routes::monitoring::configure_monitoring),
        )
        .route(
            "/api/v1/monitoring/results/:id",
            get(routes::monitoring::get_results),
        )
        .route("/api/v1/monitoring/stats", get(routes::monitoring::get_stats))
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route(
            "/api/v1/alerts/resolve-all",
            post(routes::alerts::resolve_all_alerts),
        )
        .route(
            "/api/v1/alerts/:id/resolve",
            post(routes::alerts::resolve_alert),
        )
        .route("/api/v1/events", get(routes::events::list_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
