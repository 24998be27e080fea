//! Monitoring cycle tests
//!
//! These tests verify that:
//! - A cycle probes, persists, evaluates and alerts per endpoint
//! - Only one cycle runs at a time and the guard always resets
//! - Per-endpoint storage failures do not abort the cycle
//! - Periodic cycles only check enabled endpoints that are due

use std::sync::Arc;
use std::time::Duration;

use api_sentinel::coordinator::{
    ALREADY_RUNNING_MESSAGE, CoordinatorError, CycleTrigger, MonitoringConfigPatch,
    NO_ACTIVE_ENDPOINTS_MESSAGE, NOTHING_DUE_MESSAGE,
};
use api_sentinel::inventory::EndpointPatch;
use api_sentinel::monitors::TransportError;
use api_sentinel::storage::schema::{
    AlertType, EventType, MonitoringConfig, NewCheckResult, TIMEOUT_MESSAGE,
};
use api_sentinel::storage::{MemoryBackend, StorageBackend};
use assert_matches::assert_matches;
use chrono::Utc;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_healthy_endpoint_raises_no_alerts() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 250)));
    let coordinator = coordinator(storage.clone(), transport);

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.message, "Monitoring completed: 1 successful, 0 failed");

    let results = storage.list_check_results(Some(id), 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].status_code, Some(200));
    assert_eq!(results[0].response_time_ms, Some(250.0));
    assert!(storage.list_active_alerts(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_endpoint_raises_one_latency_alert() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 1500)));
    let coordinator = coordinator(storage.clone(), transport);

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert_eq!(summary.successful, 1);

    let alerts = storage.list_active_alerts(Some(id)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::HighLatency);
    assert_eq!(alerts[0].actual_value, Some(1500.0));
    assert_eq!(alerts[0].threshold_value, Some(1000.0));
}

#[tokio::test]
async fn test_error_rate_over_recent_history() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "orders", "/orders").await;

    // 9 older results: 5 failed, 4 successful
    let now = Utc::now();
    for i in 0..9 {
        storage
            .record_check_result(NewCheckResult {
                endpoint_id: id,
                status_code: Some(if i < 5 { 500 } else { 200 }),
                response_time_ms: Some(100.0),
                success: i >= 5,
                error_message: None,
                checked_at: now - chrono::Duration::minutes(i + 1),
            })
            .await
            .unwrap();
    }

    let transport = Arc::new(FakeTransport::new(ok_after(500, 100)));
    let coordinator = coordinator(storage.clone(), transport);
    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert_eq!(summary.failed, 1);

    let alerts = storage.list_active_alerts(Some(id)).await.unwrap();
    let mut types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
    types.sort_by_key(|t| t.as_str());
    assert_eq!(types, vec![AlertType::HighErrorRate, AlertType::Unavailable]);

    let rate = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::HighErrorRate)
        .unwrap();
    assert_eq!(rate.actual_value, Some(0.6));
    assert_eq!(rate.threshold_value, Some(0.1));
}

#[tokio::test]
async fn test_timeout_and_unreachable_endpoints() {
    let storage = Arc::new(MemoryBackend::new());
    let slow = register(storage.as_ref(), "reports", "/slow").await;
    let down = register(storage.as_ref(), "reports", "/down").await;

    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    transport.respond(&url("/slow"), Err(TransportError::Timeout));
    transport.respond(
        &url("/down"),
        Err(TransportError::Failed("connection refused".to_string())),
    );
    let coordinator = coordinator(storage.clone(), transport);

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 2);

    let slow_result = &storage.list_check_results(Some(slow), 1).await.unwrap()[0];
    assert_eq!(slow_result.error_message.as_deref(), Some(TIMEOUT_MESSAGE));
    assert_eq!(slow_result.status_code, None);

    let slow_alerts = storage.list_active_alerts(Some(slow)).await.unwrap();
    assert_eq!(slow_alerts.len(), 1);
    assert_eq!(slow_alerts[0].alert_type, AlertType::Timeout);

    let down_alerts = storage.list_active_alerts(Some(down)).await.unwrap();
    assert_eq!(down_alerts.len(), 1);
    assert_eq!(down_alerts[0].alert_type, AlertType::Unavailable);
}

#[tokio::test]
async fn test_no_active_endpoints() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    storage
        .update_endpoint(
            id,
            EndpointPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    let coordinator = coordinator(storage.clone(), transport.clone());

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert!(!summary.success);
    assert_eq!(summary.message, NO_ACTIVE_ENDPOINTS_MESSAGE);
    assert_eq!(transport.calls(), 0);
    assert!(storage.list_check_results(None, 10).await.unwrap().is_empty());
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_concurrent_cycle_is_rejected() {
    let storage = Arc::new(MemoryBackend::new());
    register(storage.as_ref(), "users", "/users").await;
    let transport =
        Arc::new(FakeTransport::new(ok_after(200, 10)).with_delay(Duration::from_millis(200)));
    let coordinator = coordinator(storage.clone(), transport.clone());

    let (first, second) = tokio::join!(
        coordinator.run_cycle(CycleTrigger::Manual),
        coordinator.run_cycle(CycleTrigger::Manual),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.message, ALREADY_RUNNING_MESSAGE);
    assert_eq!(transport.calls(), 1);

    assert!(!coordinator.is_running());
    let third = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert!(third.success);
}

#[tokio::test]
async fn test_guard_resets_after_fault() {
    let storage = Arc::new(FlakyBackend::new());
    register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    let coordinator = coordinator(storage.clone(), transport);

    storage.fail_listing(true);
    let outcome = coordinator.run_cycle(CycleTrigger::Manual).await;
    assert_matches!(outcome, Err(CoordinatorError::Storage(_)));
    assert!(!coordinator.is_running());

    storage.fail_listing(false);
    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.successful, 1);
}

#[tokio::test]
async fn test_endpoint_storage_failure_does_not_abort_cycle() {
    let storage = Arc::new(FlakyBackend::new());
    let broken = register(storage.as_ref(), "users", "/broken").await;
    let healthy = register(storage.as_ref(), "users", "/healthy").await;
    storage.fail_results_for(broken);

    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    let coordinator = coordinator(storage.clone(), transport);

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        storage.list_check_results(Some(healthy), 10).await.unwrap().len(),
        1
    );

    let alerts = storage.list_active_alerts(Some(broken)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Failure);
    assert_eq!(alerts[0].actual_value, Some(0.0));
    assert_eq!(alerts[0].message, "Endpoint check failed: users - /broken");
    assert!(storage.list_active_alerts(Some(healthy)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_status_raises_unavailable() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(503, 10)));
    let coordinator = coordinator(storage.clone(), transport);

    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, 1);

    let result = &storage.list_check_results(Some(id), 1).await.unwrap()[0];
    assert!(!result.success);
    assert_eq!(result.status_code, Some(503));

    let alerts = storage.list_active_alerts(Some(id)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Unavailable);
    assert_eq!(alerts[0].actual_value, Some(503.0));
    assert_eq!(alerts[0].message, "Endpoint unavailable: users - /users (HTTP 503)");
}

#[tokio::test]
async fn test_cycle_writes_one_summary_event() {
    let storage = Arc::new(MemoryBackend::new());
    register(storage.as_ref(), "users", "/a").await;
    register(storage.as_ref(), "users", "/b").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    let coordinator = coordinator(storage.clone(), transport);

    coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();

    let events = storage
        .list_events(Some(EventType::Monitoring), 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "Monitoring completed: 2 successful, 0 failed");
}

#[tokio::test]
async fn test_periodic_cycle_checks_only_due_endpoints() {
    let storage = Arc::new(MemoryBackend::new());
    let fresh = register(storage.as_ref(), "users", "/fresh").await;
    let disabled = register(storage.as_ref(), "users", "/disabled").await;
    let due = register(storage.as_ref(), "users", "/due").await;

    storage
        .set_monitoring_config(
            fresh,
            MonitoringConfig {
                last_check: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    storage
        .set_monitoring_config(
            disabled,
            MonitoringConfig {
                enabled: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let transport = Arc::new(FakeTransport::new(ok_after(200, 10)));
    let coordinator = coordinator(storage.clone(), transport.clone());

    let summary = coordinator.run_cycle(CycleTrigger::Periodic).await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(transport.calls(), 1);
    assert_eq!(storage.list_check_results(Some(due), 10).await.unwrap().len(), 1);

    let stamped = storage.get_monitoring_config(due).await.unwrap().unwrap();
    assert!(stamped.last_check.is_some());

    // Everything checked recently: the next tick has nothing to do
    let summary = coordinator.run_cycle(CycleTrigger::Periodic).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.message, NOTHING_DUE_MESSAGE);
    assert_eq!(transport.calls(), 1);

    // A manual cycle ignores schedules and the enabled flag
    let summary = coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    assert_eq!(summary.total, 3);
}

#[tokio::test]
async fn test_test_one() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(503, 40)));
    let coordinator = coordinator(storage.clone(), transport);

    let result = coordinator.test_one(id).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status_code, Some(503));

    let alerts = storage.list_active_alerts(Some(id)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Unavailable);
    assert_eq!(alerts[0].actual_value, Some(503.0));

    assert_matches!(
        coordinator.test_one(id + 99).await,
        Err(CoordinatorError::EndpointNotFound(_))
    );
}

#[tokio::test]
async fn test_configure_merges_and_logs() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 300)));
    let coordinator = coordinator(storage.clone(), transport);

    let (_, config) = coordinator
        .configure(
            id,
            MonitoringConfigPatch {
                latency_threshold_ms: Some(200.0),
                timeout_seconds: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(config.latency_threshold_ms, 200.0);
    assert_eq!(config.check_interval_seconds, 300);

    let events = storage
        .list_events(Some(EventType::Monitoring), 10)
        .await
        .unwrap();
    assert_eq!(events[0].message, "Monitoring configuration updated");
    assert_eq!(events[0].details.as_deref(), Some("Interval: 300s, Timeout: 5s"));

    // The stored threshold now applies to probes
    coordinator.test_one(id).await.unwrap();
    let alerts = storage.list_active_alerts(Some(id)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].threshold_value, Some(200.0));

    let invalid = MonitoringConfigPatch {
        error_rate_threshold: Some(2.0),
        ..Default::default()
    };
    assert_matches!(
        coordinator.configure(id, invalid).await,
        Err(CoordinatorError::InvalidConfig(_))
    );
    assert_matches!(
        coordinator.configure(id + 1, MonitoringConfigPatch::default()).await,
        Err(CoordinatorError::EndpointNotFound(_))
    );
}

#[tokio::test]
async fn test_results_and_stats() {
    let storage = Arc::new(MemoryBackend::new());
    let id = register(storage.as_ref(), "users", "/users").await;
    let transport = Arc::new(FakeTransport::new(ok_after(200, 100)));
    let coordinator = coordinator(storage.clone(), transport.clone());

    coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();
    transport.respond(&url("/users"), ok_after(500, 300));
    coordinator.run_cycle(CycleTrigger::Manual).await.unwrap();

    let (endpoint, results) = coordinator.results(id, 10).await.unwrap();
    assert_eq!(endpoint.id, id);
    assert_eq!(results.len(), 2);

    let stats = coordinator.stats(24).await.unwrap();
    assert_eq!(stats.total_checks, 2);
    assert_eq!(stats.successful_checks, 1);
    assert_eq!(stats.failed_checks, 1);
    assert_eq!(stats.availability, 50.0);
    assert_eq!(stats.avg_response_time_ms, 200.0);
    assert!(stats.last_check.is_some());
}
