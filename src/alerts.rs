use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::AlertSettings;
use crate::storage::schema::{
    Alert, AlertId, AlertIntent, AlertSeverity, EndpointId, EventSeverity, EventType,
    NewAuditEvent,
};
use crate::storage::{StorageBackend, StorageResult};

/// Persists and resolves alerts
#[derive(Clone)]
pub struct AlertManager {
    storage: Arc<dyn StorageBackend>,
    settings: AlertSettings,
}

impl AlertManager {
    pub fn new(storage: Arc<dyn StorageBackend>, settings: AlertSettings) -> Self {
        Self { storage, settings }
    }

    #[instrument(skip(self, intent), fields(endpoint_id = intent.endpoint_id, alert_type = %intent.alert_type))]
    pub async fn create_alert(&self, intent: AlertIntent) -> StorageResult<AlertId> {
        let id = self.storage.create_alert(intent).await?;
        debug!("created alert {id}");
        Ok(id)
    }

    /// Returns `false` if the alert does not exist or was already resolved
    #[instrument(skip(self))]
    pub async fn resolve_alert(&self, alert_id: AlertId) -> StorageResult<bool> {
        let resolved = self.storage.resolve_alert(alert_id).await?;
        if resolved {
            info!("resolved alert {alert_id}");
        }
        Ok(resolved)
    }

    /// Resolve every open alert and return how many were resolved
    ///
    /// A failure on one alert is logged and does not stop the others.
    #[instrument(skip(self))]
    pub async fn resolve_all(&self) -> StorageResult<usize> {
        let open = self.storage.list_active_alerts(None).await?;

        let mut resolved = 0;
        for alert in open {
            match self.storage.resolve_alert(alert.id).await {
                Ok(true) => resolved += 1,
                Ok(false) => {}
                Err(e) => error!("failed to resolve alert {}: {}", alert.id, e),
            }
        }

        info!("resolved {resolved} alerts");
        Ok(resolved)
    }

    pub async fn list_active(&self, endpoint_id: Option<EndpointId>) -> StorageResult<Vec<Alert>> {
        self.storage.list_active_alerts(endpoint_id).await
    }

    /// Persist the intents raised by one check
    ///
    /// With `dedupe_open_alerts` enabled, an intent is dropped when its
    /// endpoint already has an open alert of the same type. Every created
    /// alert is mirrored into the audit log.
    pub async fn record(&self, intents: Vec<AlertIntent>) -> StorageResult<Vec<AlertId>> {
        let mut created = Vec::with_capacity(intents.len());
        let mut open_types = HashSet::new();

        if self.settings.dedupe_open_alerts {
            let endpoints: HashSet<EndpointId> = intents.iter().map(|i| i.endpoint_id).collect();
            for endpoint_id in endpoints {
                for alert in self.storage.list_active_alerts(Some(endpoint_id)).await? {
                    open_types.insert((alert.endpoint_id, alert.alert_type));
                }
            }
        }

        for intent in intents {
            if self.settings.dedupe_open_alerts
                && !open_types.insert((intent.endpoint_id, intent.alert_type))
            {
                debug!(
                    "skipping {} for endpoint {}: already open",
                    intent.alert_type, intent.endpoint_id
                );
                continue;
            }

            let event = NewAuditEvent::new(EventType::Alert, intent.message.clone())
                .endpoint(intent.endpoint_id)
                .details(describe(&intent))
                .severity(match intent.severity {
                    AlertSeverity::Warning => EventSeverity::Warning,
                    AlertSeverity::Danger => EventSeverity::Error,
                });

            created.push(self.create_alert(intent).await?);

            if let Err(e) = self.storage.log_event(event).await {
                warn!("failed to write alert audit event: {}", e);
            }
        }

        Ok(created)
    }
}

fn describe(intent: &AlertIntent) -> String {
    let mut details = format!("{} ({})", intent.alert_type, intent.severity);
    if let Some(actual) = intent.actual_value {
        details.push_str(&format!(", actual: {actual}"));
    }
    if let Some(threshold) = intent.threshold_value {
        details.push_str(&format!(", threshold: {threshold}"));
    }
    details
}
