//! In-memory storage backend (no persistence)
//!
//! This backend keeps every entity in process memory behind a single lock.
//! It's useful for:
//! - Testing without database dependencies
//! - Ephemeral runs (`storage.backend = "none"`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded**: check results and events are never evicted

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use super::schema::{
    Alert, AlertId, AlertIntent, AuditEvent, CheckResult, Endpoint, EndpointId, EventType,
    MonitoringConfig, MonitoringStats, NewAuditEvent, NewCheckResult,
};
use crate::inventory::{EndpointPatch, NewEndpoint, is_internal_url};

#[derive(Default)]
struct MemoryState {
    endpoints: Vec<Endpoint>,
    configs: HashMap<EndpointId, (i64, MonitoringConfig)>,
    results: Vec<CheckResult>,
    alerts: Vec<Alert>,
    events: Vec<AuditEvent>,
    next_endpoint_id: i64,
    next_config_id: i64,
    next_result_id: i64,
    next_alert_id: i64,
    next_event_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn sorted_endpoints<'a>(endpoints: impl Iterator<Item = &'a Endpoint>) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = endpoints.cloned().collect();
    endpoints.sort_by(|a, b| {
        a.service_name
            .cmp(&b.service_name)
            .then_with(|| a.path.cmp(&b.path))
    });
    endpoints
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn register_endpoint(&self, endpoint: NewEndpoint) -> StorageResult<EndpointId> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let is_internal = is_internal_url(&endpoint.base_url);

        if let Some(existing) = state.endpoints.iter_mut().find(|e| {
            e.base_url == endpoint.base_url && e.path == endpoint.path && e.method == endpoint.method
        }) {
            existing.service_name = endpoint.service_name;
            existing.description = endpoint.description;
            existing.auth_type = endpoint.auth_type;
            existing.is_internal = is_internal;
            existing.discovery_source = endpoint.discovery_source;
            existing.updated_at = now;
            debug!("updated existing endpoint {}", existing.id);
            return Ok(existing.id);
        }

        let id = next(&mut state.next_endpoint_id);
        state.endpoints.push(Endpoint {
            id,
            service_name: endpoint.service_name,
            base_url: endpoint.base_url,
            path: endpoint.path,
            method: endpoint.method,
            description: endpoint.description,
            auth_type: endpoint.auth_type,
            is_internal,
            is_active: true,
            discovery_source: endpoint.discovery_source,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_endpoint(&self, id: EndpointId, patch: EndpointPatch) -> StorageResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.write().await;
        let Some(endpoint) = state.endpoints.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };

        if let Some(service_name) = patch.service_name {
            endpoint.service_name = service_name;
        }
        if let Some(base_url) = patch.base_url {
            endpoint.base_url = base_url;
        }
        if let Some(path) = patch.path {
            endpoint.path = path;
        }
        if let Some(method) = patch.method {
            endpoint.method = method;
        }
        if let Some(description) = patch.description {
            endpoint.description = Some(description);
        }
        if let Some(auth_type) = patch.auth_type {
            endpoint.auth_type = Some(auth_type);
        }
        if let Some(is_internal) = patch.is_internal {
            endpoint.is_internal = is_internal;
        }
        if let Some(is_active) = patch.is_active {
            endpoint.is_active = is_active;
        }
        endpoint.updated_at = Utc::now();

        Ok(true)
    }

    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let state = self.state.read().await;
        Ok(sorted_endpoints(state.endpoints.iter()))
    }

    async fn list_active_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let state = self.state.read().await;
        Ok(sorted_endpoints(state.endpoints.iter().filter(|e| e.is_active)))
    }

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>> {
        let state = self.state.read().await;
        Ok(state.endpoints.iter().find(|e| e.id == id).cloned())
    }

    async fn get_monitoring_config(
        &self,
        endpoint_id: EndpointId,
    ) -> StorageResult<Option<MonitoringConfig>> {
        let state = self.state.read().await;
        Ok(state
            .configs
            .get(&endpoint_id)
            .map(|(_, config)| config.clone()))
    }

    async fn set_monitoring_config(
        &self,
        endpoint_id: EndpointId,
        config: MonitoringConfig,
    ) -> StorageResult<i64> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let id = match state.configs.get(&endpoint_id) {
            Some((id, _)) => *id,
            None => next(&mut state.next_config_id),
        };
        state.configs.insert(endpoint_id, (id, config));
        Ok(id)
    }

    async fn mark_checked(&self, endpoint_id: EndpointId, at: DateTime<Utc>) -> StorageResult<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match state.configs.get_mut(&endpoint_id) {
            Some((_, config)) => config.last_check = Some(at),
            None => {
                let id = next(&mut state.next_config_id);
                let config = MonitoringConfig {
                    last_check: Some(at),
                    ..Default::default()
                };
                state.configs.insert(endpoint_id, (id, config));
            }
        }
        Ok(())
    }

    async fn record_check_result(&self, result: NewCheckResult) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        let id = next(&mut state.next_result_id);
        state.results.push(result.persisted(id));
        Ok(id)
    }

    async fn list_check_results(
        &self,
        endpoint_id: Option<EndpointId>,
        limit: usize,
    ) -> StorageResult<Vec<CheckResult>> {
        let state = self.state.read().await;
        let mut results: Vec<CheckResult> = state
            .results
            .iter()
            .filter(|r| endpoint_id.is_none_or(|id| r.endpoint_id == id))
            .cloned()
            .collect();
        results.sort_by_key(|r| Reverse((r.checked_at, r.id)));
        results.truncate(limit);
        Ok(results)
    }

    async fn compute_window_stats(&self, since: DateTime<Utc>) -> StorageResult<MonitoringStats> {
        let state = self.state.read().await;
        Ok(MonitoringStats::from_results(&state.results, since))
    }

    async fn create_alert(&self, intent: AlertIntent) -> StorageResult<AlertId> {
        let mut state = self.state.write().await;
        let id = next(&mut state.next_alert_id);
        state.alerts.push(Alert {
            id,
            endpoint_id: intent.endpoint_id,
            alert_type: intent.alert_type,
            severity: intent.severity,
            message: intent.message,
            threshold_value: intent.threshold_value,
            actual_value: intent.actual_value,
            is_resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        });
        Ok(id)
    }

    async fn get_alert(&self, id: AlertId) -> StorageResult<Option<Alert>> {
        let state = self.state.read().await;
        Ok(state.alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn list_active_alerts(
        &self,
        endpoint_id: Option<EndpointId>,
    ) -> StorageResult<Vec<Alert>> {
        let state = self.state.read().await;
        let mut alerts: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| !a.is_resolved)
            .filter(|a| endpoint_id.is_none_or(|id| a.endpoint_id == id))
            .cloned()
            .collect();
        alerts.sort_by_key(|a| Reverse((a.created_at, a.id)));
        Ok(alerts)
    }

    async fn resolve_alert(&self, id: AlertId) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        match state.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) if !alert.is_resolved => {
                alert.is_resolved = true;
                alert.resolved_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn log_event(&self, event: NewAuditEvent) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        let id = next(&mut state.next_event_id);
        state.events.push(AuditEvent {
            id,
            event_type: event.event_type,
            endpoint_id: event.endpoint_id,
            message: event.message,
            details: event.details,
            severity: event.severity,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_events(
        &self,
        event_type: Option<EventType>,
        limit: usize,
    ) -> StorageResult<Vec<AuditEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("endpoints".to_string(), state.endpoints.len().to_string()),
                ("check_results".to_string(), state.results.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
