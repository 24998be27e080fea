//! Storage backend trait definition
//!
//! This module defines the `StorageBackend` trait, the only way the
//! monitoring engine touches durable state.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    Alert, AlertId, AlertIntent, AuditEvent, CheckResult, Endpoint, EndpointId, EventType,
    MonitoringConfig, MonitoringStats, NewAuditEvent, NewCheckResult,
};
use crate::inventory::{EndpointPatch, NewEndpoint};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// coordinator's concurrent endpoint checks and the API handlers.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>` which wraps `StorageError`.
/// Implementations should convert backend-specific errors to
/// `StorageError` variants. Each write is committed on its own.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Endpoint inventory
    // ========================================================================

    /// Insert an endpoint, or update the existing record with the same
    /// (`base_url`, `path`, `method`) triple. Returns the endpoint id.
    async fn register_endpoint(&self, endpoint: NewEndpoint) -> StorageResult<EndpointId>;

    /// Apply a partial update. Returns `false` if the endpoint does not exist
    /// or the patch is empty.
    async fn update_endpoint(&self, id: EndpointId, patch: EndpointPatch) -> StorageResult<bool>;

    /// All endpoints ordered by service name, then path
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>>;

    /// Endpoints with `is_active = true`, ordered by service name, then path
    async fn list_active_endpoints(&self) -> StorageResult<Vec<Endpoint>>;

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>>;

    // ========================================================================
    // Monitoring configuration
    // ========================================================================

    async fn get_monitoring_config(
        &self,
        endpoint_id: EndpointId,
    ) -> StorageResult<Option<MonitoringConfig>>;

    /// Insert or replace the configuration of an endpoint. Returns the config id.
    async fn set_monitoring_config(
        &self,
        endpoint_id: EndpointId,
        config: MonitoringConfig,
    ) -> StorageResult<i64>;

    /// Stamp `last_check` on the endpoint's configuration
    ///
    /// An endpoint without a stored configuration gets the default one.
    async fn mark_checked(&self, endpoint_id: EndpointId, at: DateTime<Utc>) -> StorageResult<()>;

    // ========================================================================
    // Check results
    // ========================================================================

    /// Append a check result. Returns the result id.
    async fn record_check_result(&self, result: NewCheckResult) -> StorageResult<i64>;

    /// Most recent results first, optionally for a single endpoint
    async fn list_check_results(
        &self,
        endpoint_id: Option<EndpointId>,
        limit: usize,
    ) -> StorageResult<Vec<CheckResult>>;

    /// Aggregate statistics over all results checked at or after `since`
    async fn compute_window_stats(&self, since: DateTime<Utc>) -> StorageResult<MonitoringStats>;

    // ========================================================================
    // Alerts
    // ========================================================================

    async fn create_alert(&self, intent: AlertIntent) -> StorageResult<AlertId>;

    async fn get_alert(&self, id: AlertId) -> StorageResult<Option<Alert>>;

    /// Unresolved alerts, newest first, optionally for a single endpoint
    async fn list_active_alerts(&self, endpoint_id: Option<EndpointId>)
    -> StorageResult<Vec<Alert>>;

    /// Mark an alert resolved
    ///
    /// Returns `false` if the alert does not exist or is already resolved;
    /// an existing `resolved_at` is never overwritten.
    async fn resolve_alert(&self, id: AlertId) -> StorageResult<bool>;

    // ========================================================================
    // Audit log
    // ========================================================================

    async fn log_event(&self, event: NewAuditEvent) -> StorageResult<i64>;

    /// Most recent events first, optionally filtered by type
    async fn list_events(
        &self,
        event_type: Option<EventType>,
        limit: usize,
    ) -> StorageResult<Vec<AuditEvent>>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Performs a lightweight operation to verify the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Gracefully shuts down the backend, closing connections
    async fn close(&self) -> StorageResult<()>;
}
