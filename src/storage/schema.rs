//! Row types shared by every storage backend
//!
//! ## Entities
//!
//! - [`Endpoint`] - one monitored HTTP route (owned by the inventory)
//! - [`MonitoringConfig`] - per-endpoint probe settings and thresholds
//! - [`CheckResult`] - append-only outcome of a single probe
//! - [`Alert`] - threshold breach, mutated only by resolution
//! - [`AuditEvent`] - write-only operational log entry
//!
//! Timestamps are always UTC. Backends are free to store them in whatever
//! representation suits them (the SQLite backend uses Unix milliseconds).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an endpoint record
pub type EndpointId = i64;

/// Identifier of an alert record
pub type AlertId = i64;

/// Error message recorded when a probe exceeds its timeout
///
/// The evaluator relies on this exact text to tell timeouts apart from
/// other transport failures once a result has been persisted.
pub const TIMEOUT_MESSAGE: &str = "Request timeout";

/// HTTP methods an endpoint can be registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("unsupported HTTP method: {s}")),
        }
    }
}

/// A monitored API endpoint
///
/// The (`base_url`, `path`, `method`) triple is unique across the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub service_name: String,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub description: Option<String>,
    pub auth_type: Option<String>,

    /// Whether the host looks like an internal service (see `inventory::is_internal_url`)
    pub is_internal: bool,

    /// Only active endpoints take part in monitoring cycles
    pub is_active: bool,

    /// Where the endpoint came from ("manual", "openapi", ...)
    pub discovery_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// Full request URL: base URL without trailing slash, followed by the path
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }

    /// Short label used in alert messages and logs
    pub fn label(&self) -> String {
        format!("{} - {}", self.service_name, self.path)
    }
}

pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_LATENCY_THRESHOLD_MS: f64 = 1000.0;
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.1;

/// Per-endpoint monitoring settings
///
/// An endpoint without a stored config is monitored with `MonitoringConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub check_interval_seconds: u64,
    pub timeout_seconds: u64,
    pub latency_threshold_ms: f64,

    /// Fraction of failed checks (0.0 - 1.0) above which HIGH_ERROR_RATE fires
    pub error_rate_threshold: f64,
    pub enabled: bool,
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
            enabled: true,
            last_check: None,
        }
    }
}

impl MonitoringConfig {
    /// Whether a periodic cycle should check the endpoint at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_check {
            None => true,
            Some(last) => {
                let interval = i64::try_from(self.check_interval_seconds).unwrap_or(i64::MAX);
                (now - last).num_seconds() >= interval
            }
        }
    }
}

/// Outcome of a probe that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckResult {
    pub endpoint_id: EndpointId,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl NewCheckResult {
    /// Attach the identifier assigned by the storage backend
    pub fn persisted(self, id: i64) -> CheckResult {
        CheckResult {
            id,
            endpoint_id: self.endpoint_id,
            status_code: self.status_code,
            response_time_ms: self.response_time_ms,
            success: self.success,
            error_message: self.error_message,
            checked_at: self.checked_at,
        }
    }
}

/// A persisted probe outcome. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: i64,
    pub endpoint_id: EndpointId,

    /// Absent when the request never produced a response
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error_message.as_deref() == Some(TIMEOUT_MESSAGE)
    }
}

/// Kinds of alerts the evaluator can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Timeout,
    Failure,
    HighLatency,
    Unavailable,
    HighErrorRate,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Timeout => "TIMEOUT",
            AlertType::Failure => "FAILURE",
            AlertType::HighLatency => "HIGH_LATENCY",
            AlertType::Unavailable => "UNAVAILABLE",
            AlertType::HighErrorRate => "HIGH_ERROR_RATE",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TIMEOUT" => Ok(AlertType::Timeout),
            "FAILURE" => Ok(AlertType::Failure),
            "HIGH_LATENCY" => Ok(AlertType::HighLatency),
            "UNAVAILABLE" => Ok(AlertType::Unavailable),
            "HIGH_ERROR_RATE" => Ok(AlertType::HighErrorRate),
            _ => Err(format!("unknown alert type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Danger,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Danger => "danger",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(AlertSeverity::Warning),
            "danger" => Ok(AlertSeverity::Danger),
            _ => Err(format!("unknown alert severity: {s}")),
        }
    }
}

/// An alert proposed by the evaluator, before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertIntent {
    pub endpoint_id: EndpointId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
}

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub endpoint_id: EndpointId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Monitoring,
    Inventory,
    Alert,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Monitoring => "MONITORING",
            EventType::Inventory => "INVENTORY",
            EventType::Alert => "ALERT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MONITORING" => Ok(EventType::Monitoring),
            "INVENTORY" => Ok(EventType::Inventory),
            "ALERT" => Ok(EventType::Alert),
            _ => Err(format!("unknown event type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventSeverity {
    #[default]
    Info,
    Warning,
    Error,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Info => "INFO",
            EventSeverity::Warning => "WARNING",
            EventSeverity::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(EventSeverity::Info),
            "WARNING" => Ok(EventSeverity::Warning),
            "ERROR" => Ok(EventSeverity::Error),
            _ => Err(format!("unknown event severity: {s}")),
        }
    }
}

/// An audit event to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub event_type: EventType,
    pub endpoint_id: Option<EndpointId>,
    pub message: String,
    pub details: Option<String>,
    pub severity: EventSeverity,
}

impl NewAuditEvent {
    pub fn new(event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            event_type,
            endpoint_id: None,
            message: message.into(),
            details: None,
            severity: EventSeverity::Info,
        }
    }

    pub fn endpoint(mut self, endpoint_id: EndpointId) -> Self {
        self.endpoint_id = Some(endpoint_id);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub event_type: EventType,
    pub endpoint_id: Option<EndpointId>,
    pub message: String,
    pub details: Option<String>,
    pub severity: EventSeverity,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics over a window of check results
///
/// ## Calculation
///
/// availability % = (successful checks / total checks) × 100
///
/// Both `availability` and `avg_response_time_ms` are rounded to two
/// decimals and are `0` when there is nothing to average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStats {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub availability: f64,
    pub avg_response_time_ms: f64,
    pub last_check: Option<DateTime<Utc>>,
}

impl MonitoringStats {
    /// Compute statistics for the results checked at or after `since`
    pub fn from_results<'a>(
        results: impl IntoIterator<Item = &'a CheckResult>,
        since: DateTime<Utc>,
    ) -> Self {
        let mut total = 0u64;
        let mut successful = 0u64;
        let mut latency_sum = 0.0;
        let mut latency_count = 0u64;
        let mut last_check: Option<DateTime<Utc>> = None;

        for result in results.into_iter().filter(|r| r.checked_at >= since) {
            total += 1;
            if result.success {
                successful += 1;
            }
            if let Some(ms) = result.response_time_ms {
                latency_sum += ms;
                latency_count += 1;
            }
            last_check = last_check.max(Some(result.checked_at));
        }

        let avg = (latency_count > 0).then(|| latency_sum / latency_count as f64);
        Self::from_aggregates(total, successful, avg, last_check)
    }

    /// Build statistics from pre-aggregated values (e.g. a SQL `COUNT`/`AVG`)
    pub fn from_aggregates(
        total: u64,
        successful: u64,
        avg_response_time_ms: Option<f64>,
        last_check: Option<DateTime<Utc>>,
    ) -> Self {
        if total == 0 {
            return Self::empty();
        }

        Self {
            total_checks: total,
            successful_checks: successful,
            failed_checks: total - successful,
            availability: round2(successful as f64 / total as f64 * 100.0),
            avg_response_time_ms: avg_response_time_ms.map(round2).unwrap_or(0.0),
            last_check,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            availability: 0.0,
            avg_response_time_ms: 0.0,
            last_check: None,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
