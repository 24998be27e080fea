//! Monitoring cycle coordinator
//!
//! Orchestrates one pass over the eligible endpoints:
//!
//! ```text
//! list active endpoints → per endpoint (bounded concurrency):
//!     config (or defaults) → probe → persist result → stamp last_check
//!     → recent history → evaluate → record alerts
//! → one MONITORING summary event
//! ```
//!
//! A check abandoned on a storage fault raises a FAILURE alert when the
//! alert can still be written.
//!
//! ## Single-flight
//!
//! At most one cycle runs at a time per coordinator. The `running` flag is
//! acquired with a compare-exchange before any endpoint is touched and
//! released by [`CycleGuard`] when it is dropped, so a cycle that fails
//! halfway still returns the coordinator to idle. A second trigger while a
//! cycle is running is rejected immediately; it never queues.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::AlertManager;
use crate::config::{Config, MonitoringSettings};
use crate::monitors::{Prober, evaluate};
use crate::monitors::evaluator::ERROR_RATE_SAMPLE;
use crate::storage::schema::{
    AlertIntent, AlertSeverity, AlertType, CheckResult, Endpoint, EndpointId, EventSeverity,
    EventType, MonitoringConfig, MonitoringStats, NewAuditEvent,
};
use crate::storage::{StorageBackend, StorageError};

pub const ALREADY_RUNNING_MESSAGE: &str = "Monitoring is already running";
pub const NO_ACTIVE_ENDPOINTS_MESSAGE: &str = "No active endpoints to monitor";
pub const NOTHING_DUE_MESSAGE: &str = "No endpoints due for monitoring";

/// Default window of [`MonitoringCoordinator::stats`]
pub const DEFAULT_STATS_WINDOW_HOURS: i64 = 24;

/// Errors that abort a coordinator operation
#[derive(Debug)]
pub enum CoordinatorError {
    /// Storage could not be reached for a coordinator-level read or write
    Storage(StorageError),

    EndpointNotFound(EndpointId),

    /// A monitoring configuration patch failed validation
    InvalidConfig(String),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::Storage(err) => write!(f, "storage error: {}", err),
            CoordinatorError::EndpointNotFound(id) => write!(f, "endpoint {} not found", id),
            CoordinatorError::InvalidConfig(msg) => {
                write!(f, "invalid monitoring configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for CoordinatorError {
    fn from(err: StorageError) -> Self {
        CoordinatorError::Storage(err)
    }
}

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    /// Operator request: every active endpoint is checked
    Manual,

    /// Timer tick: only enabled endpoints whose interval has elapsed
    Periodic,
}

impl fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleTrigger::Manual => f.write_str("manual"),
            CycleTrigger::Periodic => f.write_str("periodic"),
        }
    }
}

/// Outcome of [`MonitoringCoordinator::run_cycle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub message: String,
}

impl RunSummary {
    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            total: 0,
            successful: 0,
            failed: 0,
            message: message.to_string(),
        }
    }

    fn completed(successful: usize, failed: usize) -> Self {
        Self {
            success: true,
            total: successful + failed,
            successful,
            failed,
            message: format!("Monitoring completed: {successful} successful, {failed} failed"),
        }
    }
}

/// Holds the coordinator's running flag for the duration of a cycle
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    /// Returns `None` when a cycle already holds the flag
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Partial update of a monitoring configuration
///
/// Absent fields keep their current value (or the default when the
/// endpoint has no configuration yet).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfigPatch {
    pub check_interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub latency_threshold_ms: Option<f64>,
    pub error_rate_threshold: Option<f64>,
    pub enabled: Option<bool>,
}

/// Upper bound for `check_interval_seconds` and `timeout_seconds`
pub const MAX_CONFIG_SECONDS: u64 = 365 * 24 * 60 * 60;

impl MonitoringConfigPatch {
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |secs: u64| (1..=MAX_CONFIG_SECONDS).contains(&secs);
        if self.check_interval_seconds.is_some_and(|secs| !in_range(secs)) {
            return Err(format!(
                "check_interval_seconds must be between 1 and {MAX_CONFIG_SECONDS}"
            ));
        }
        if self.timeout_seconds.is_some_and(|secs| !in_range(secs)) {
            return Err(format!("timeout_seconds must be between 1 and {MAX_CONFIG_SECONDS}"));
        }
        if self
            .latency_threshold_ms
            .is_some_and(|latency| !(latency >= 0.0 && latency.is_finite()))
        {
            return Err("latency_threshold_ms must be a non-negative number".to_string());
        }
        if self
            .error_rate_threshold
            .is_some_and(|rate| !(0.0..=1.0).contains(&rate))
        {
            return Err("error_rate_threshold must be between 0 and 1".to_string());
        }
        Ok(())
    }

    pub fn apply(self, mut config: MonitoringConfig) -> MonitoringConfig {
        if let Some(interval) = self.check_interval_seconds {
            config.check_interval_seconds = interval;
        }
        if let Some(timeout) = self.timeout_seconds {
            config.timeout_seconds = timeout;
        }
        if let Some(latency) = self.latency_threshold_ms {
            config.latency_threshold_ms = latency;
        }
        if let Some(rate) = self.error_rate_threshold {
            config.error_rate_threshold = rate;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        config
    }
}

enum CheckOutcome {
    Succeeded,
    Failed,
    Skipped,
}

pub struct MonitoringCoordinator {
    storage: Arc<dyn StorageBackend>,
    prober: Prober,
    alerts: AlertManager,
    running: AtomicBool,
    max_concurrent_checks: usize,
}

impl MonitoringCoordinator {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        prober: Prober,
        alerts: AlertManager,
        settings: &MonitoringSettings,
    ) -> Self {
        Self {
            storage,
            prober,
            alerts,
            running: AtomicBool::new(false),
            max_concurrent_checks: settings.max_concurrent_checks.max(1),
        }
    }

    /// Wire a coordinator with an HTTP prober and alert manager from `config`
    pub fn from_config(
        storage: Arc<dyn StorageBackend>,
        config: &Config,
    ) -> Result<Self, reqwest::Error> {
        let prober = Prober::http(&config.prober)?;
        let alerts = AlertManager::new(storage.clone(), config.alerts.clone());
        Ok(Self::new(storage, prober, alerts, &config.monitoring))
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one monitoring pass
    ///
    /// Rejections ("already running", "no active endpoints") are reported
    /// through the summary. Only a failure to list endpoints aborts the
    /// cycle with an error; per-endpoint storage failures are logged and
    /// counted as failed checks.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, trigger: CycleTrigger) -> Result<RunSummary, CoordinatorError> {
        let Some(_guard) = CycleGuard::try_acquire(&self.running) else {
            debug!("cycle rejected, another one is running");
            return Ok(RunSummary::rejected(ALREADY_RUNNING_MESSAGE));
        };

        let endpoints = self.storage.list_active_endpoints().await?;
        if endpoints.is_empty() {
            info!("no active endpoints to monitor");
            return Ok(RunSummary::rejected(NO_ACTIVE_ENDPOINTS_MESSAGE));
        }

        info!("{trigger} monitoring started for {} endpoints", endpoints.len());
        let now = Utc::now();

        let outcomes: Vec<CheckOutcome> = stream::iter(endpoints)
            .map(|endpoint| self.check_endpoint(endpoint, trigger, now))
            .buffer_unordered(self.max_concurrent_checks)
            .collect()
            .await;

        let successful = outcomes
            .iter()
            .filter(|o| matches!(o, CheckOutcome::Succeeded))
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, CheckOutcome::Failed))
            .count();

        if trigger == CycleTrigger::Periodic && successful + failed == 0 {
            debug!("no endpoints due");
            return Ok(RunSummary {
                success: true,
                ..RunSummary::rejected(NOTHING_DUE_MESSAGE)
            });
        }

        let summary = RunSummary::completed(successful, failed);
        let event = NewAuditEvent::new(EventType::Monitoring, summary.message.clone())
            .details(format!("trigger: {trigger}, total: {}", summary.total))
            .severity(if failed > 0 {
                EventSeverity::Warning
            } else {
                EventSeverity::Info
            });
        if let Err(e) = self.storage.log_event(event).await {
            warn!("failed to write monitoring summary event: {}", e);
        }

        info!(
            "monitoring run completed: {}/{} successful",
            summary.successful, summary.total
        );
        Ok(summary)
    }

    async fn check_endpoint(
        &self,
        endpoint: Endpoint,
        trigger: CycleTrigger,
        now: DateTime<Utc>,
    ) -> CheckOutcome {
        let config = match self.storage.get_monitoring_config(endpoint.id).await {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                error!("failed to load config of endpoint {}: {}", endpoint.id, e);
                return CheckOutcome::Failed;
            }
        };

        if trigger == CycleTrigger::Periodic && !(config.enabled && config.is_due(now)) {
            return CheckOutcome::Skipped;
        }

        match self.run_check(&endpoint, &config).await {
            Ok(result) if result.success => CheckOutcome::Succeeded,
            Ok(_) | Err(_) => CheckOutcome::Failed,
        }
    }

    /// Run the check pipeline, raising a FAILURE alert when it is abandoned
    async fn run_check(
        &self,
        endpoint: &Endpoint,
        config: &MonitoringConfig,
    ) -> Result<CheckResult, StorageError> {
        let outcome = self.check_pipeline(endpoint, config).await;

        if let Err(e) = &outcome {
            error!("check of endpoint {} abandoned: {}", endpoint.id, e);
            let intent = AlertIntent {
                endpoint_id: endpoint.id,
                alert_type: AlertType::Failure,
                severity: AlertSeverity::Danger,
                message: format!("Endpoint check failed: {}", endpoint.label()),
                threshold_value: None,
                actual_value: Some(0.0),
            };
            if let Err(e) = self.alerts.record(vec![intent]).await {
                warn!("failed to raise failure alert for endpoint {}: {}", endpoint.id, e);
            }
        }

        outcome
    }

    /// probe → persist → stamp → history → evaluate → alerts
    async fn check_pipeline(
        &self,
        endpoint: &Endpoint,
        config: &MonitoringConfig,
    ) -> Result<CheckResult, StorageError> {
        let probed = self.prober.probe(endpoint, config.timeout_seconds).await;
        let checked_at = probed.checked_at;

        let result_id = self.storage.record_check_result(probed.clone()).await?;
        let result = probed.persisted(result_id);

        self.storage.mark_checked(endpoint.id, checked_at).await?;

        let recent = self
            .storage
            .list_check_results(Some(endpoint.id), ERROR_RATE_SAMPLE)
            .await?;

        let intents = evaluate(endpoint, config, &result, &recent);
        if !intents.is_empty() {
            debug!("endpoint {} raised {} alerts", endpoint.id, intents.len());
            self.alerts.record(intents).await?;
        }

        Ok(result)
    }

    /// Check a single endpoint on demand, outside the single-flight guard
    #[instrument(skip(self))]
    pub async fn test_one(&self, endpoint_id: EndpointId) -> Result<CheckResult, CoordinatorError> {
        let endpoint = self
            .storage
            .get_endpoint(endpoint_id)
            .await?
            .ok_or(CoordinatorError::EndpointNotFound(endpoint_id))?;
        let config = self
            .storage
            .get_monitoring_config(endpoint_id)
            .await?
            .unwrap_or_default();

        Ok(self.run_check(&endpoint, &config).await?)
    }

    /// Merge `patch` over the endpoint's configuration and persist it
    ///
    /// Returns the configuration id and the stored configuration.
    #[instrument(skip(self, patch))]
    pub async fn configure(
        &self,
        endpoint_id: EndpointId,
        patch: MonitoringConfigPatch,
    ) -> Result<(i64, MonitoringConfig), CoordinatorError> {
        patch.validate().map_err(CoordinatorError::InvalidConfig)?;

        if self.storage.get_endpoint(endpoint_id).await?.is_none() {
            return Err(CoordinatorError::EndpointNotFound(endpoint_id));
        }

        let current = self
            .storage
            .get_monitoring_config(endpoint_id)
            .await?
            .unwrap_or_default();
        let config = patch.apply(current);

        let config_id = self
            .storage
            .set_monitoring_config(endpoint_id, config.clone())
            .await?;

        let event = NewAuditEvent::new(EventType::Monitoring, "Monitoring configuration updated")
            .endpoint(endpoint_id)
            .details(format!(
                "Interval: {}s, Timeout: {}s",
                config.check_interval_seconds, config.timeout_seconds
            ));
        self.storage.log_event(event).await?;

        info!("monitoring configured for endpoint {endpoint_id}");
        Ok((config_id, config))
    }

    /// The endpoint and its most recent results, newest first
    pub async fn results(
        &self,
        endpoint_id: EndpointId,
        limit: usize,
    ) -> Result<(Endpoint, Vec<CheckResult>), CoordinatorError> {
        let endpoint = self
            .storage
            .get_endpoint(endpoint_id)
            .await?
            .ok_or(CoordinatorError::EndpointNotFound(endpoint_id))?;
        let results = self
            .storage
            .list_check_results(Some(endpoint_id), limit)
            .await?;

        Ok((endpoint, results))
    }

    /// Aggregate statistics over the results of the last `hours` hours
    pub async fn stats(&self, hours: i64) -> Result<MonitoringStats, CoordinatorError> {
        let since = stats_window_start(Utc::now(), hours)?;
        Ok(self.storage.compute_window_stats(since).await?)
    }
}

/// Start of a stats window of `hours` hours ending at `now`
pub fn stats_window_start(
    now: DateTime<Utc>,
    hours: i64,
) -> Result<DateTime<Utc>, CoordinatorError> {
    if hours < 1 {
        return Err(CoordinatorError::InvalidConfig(
            "hours must be at least 1".to_string(),
        ));
    }

    TimeDelta::try_hours(hours)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| CoordinatorError::InvalidConfig(format!("hours out of range: {hours}")))
}
