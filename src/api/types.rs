//! API response types

use serde::{Deserialize, Serialize};

use crate::storage::schema::{Alert, AuditEvent, CheckResult, Endpoint, MonitoringConfig};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage_healthy: bool,
    pub storage_message: String,

    /// Whether a monitoring cycle is in progress
    pub monitoring_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureResponse {
    pub success: bool,
    pub config_id: i64,
    pub config: MonitoringConfig,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub endpoint: Endpoint,
    pub results: Vec<CheckResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// `false` when the alert does not exist or was already resolved
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveAllResponse {
    pub success: bool,
    pub resolved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<AuditEvent>,
    pub count: usize,
}
