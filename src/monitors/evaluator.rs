//! Threshold evaluation
//!
//! [`evaluate`] is a pure function: identical inputs always yield identical
//! alert intents. Rules are independent of each other, so one result may
//! raise several alerts. A failed result raises exactly one of TIMEOUT or
//! UNAVAILABLE.

use crate::storage::schema::{
    AlertIntent, AlertSeverity, AlertType, CheckResult, Endpoint, MonitoringConfig,
};

/// Number of most recent results the error rate is computed over
pub const ERROR_RATE_SAMPLE: usize = 10;

/// Minimum history before the error rate is evaluated at all
pub const MIN_ERROR_RATE_SAMPLES: usize = 5;

/// Decide which alerts `result` raises
///
/// `recent` is the endpoint's history ordered most recent first and is
/// expected to include `result` itself; only the first
/// [`ERROR_RATE_SAMPLE`] entries are considered.
pub fn evaluate(
    endpoint: &Endpoint,
    config: &MonitoringConfig,
    result: &CheckResult,
    recent: &[CheckResult],
) -> Vec<AlertIntent> {
    let mut intents = Vec::new();
    let label = endpoint.label();

    let intent = |alert_type, severity, message: String| AlertIntent {
        endpoint_id: endpoint.id,
        alert_type,
        severity,
        message,
        threshold_value: None,
        actual_value: None,
    };

    if let Some(latency) = result
        .response_time_ms
        .filter(|latency| *latency > config.latency_threshold_ms)
    {
        intents.push(AlertIntent {
            threshold_value: Some(config.latency_threshold_ms),
            actual_value: Some(latency),
            ..intent(
                AlertType::HighLatency,
                AlertSeverity::Warning,
                format!("High latency detected: {label}"),
            )
        });
    }

    if !result.success {
        if result.is_timeout() {
            intents.push(intent(
                AlertType::Timeout,
                AlertSeverity::Warning,
                format!("Endpoint timeout: {label}"),
            ));
        } else {
            let message = match result.status_code {
                Some(status) => format!("Endpoint unavailable: {label} (HTTP {status})"),
                None => format!("Endpoint unavailable: {label}"),
            };
            intents.push(AlertIntent {
                actual_value: result.status_code.map(f64::from),
                ..intent(AlertType::Unavailable, AlertSeverity::Danger, message)
            });
        }
    }

    if let Some(error_rate) =
        error_rate(recent).filter(|rate| *rate > config.error_rate_threshold)
    {
        intents.push(AlertIntent {
            threshold_value: Some(config.error_rate_threshold),
            actual_value: Some(error_rate),
            ..intent(
                AlertType::HighErrorRate,
                AlertSeverity::Danger,
                format!("High error rate: {label} ({:.1}%)", error_rate * 100.0),
            )
        });
    }

    intents
}

/// Fraction of failed checks among the most recent results
///
/// `None` while fewer than [`MIN_ERROR_RATE_SAMPLES`] results exist.
pub fn error_rate(recent: &[CheckResult]) -> Option<f64> {
    let sample = &recent[..recent.len().min(ERROR_RATE_SAMPLE)];
    if sample.len() < MIN_ERROR_RATE_SAMPLES {
        return None;
    }

    let failed = sample.iter().filter(|r| !r.success).count();
    Some(failed as f64 / sample.len() as f64)
}
