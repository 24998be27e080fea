//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Every write is a single statement (or a short transaction for
//! read-modify-write updates) committed on its own.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    Alert, AlertId, AlertIntent, AuditEvent, CheckResult, Endpoint, EndpointId, EventType,
    MonitoringConfig, MonitoringStats, NewAuditEvent, NewCheckResult,
};
use crate::inventory::{EndpointPatch, NewEndpoint, is_internal_url};

const ENDPOINT_COLUMNS: &str = "id, service_name, base_url, path, method, description, \
     auth_type, is_internal, is_active, discovery_source, created_at, updated_at";

const ALERT_COLUMNS: &str = "id, endpoint_id, alert_type, severity, message, threshold_value, \
     actual_value, is_resolved, created_at, resolved_at";

const RESULT_COLUMNS: &str =
    "id, endpoint_id, status_code, response_time_ms, success, error_message, checked_at";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode with foreign keys enforced
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use api_sentinel::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./sentinel.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn parse_column<T: FromStr<Err = String>>(row: &SqliteRow, column: &str) -> StorageResult<T> {
        let raw: String = row.try_get(column)?;
        raw.parse().map_err(StorageError::InvalidRow)
    }

    fn endpoint_from_row(row: &SqliteRow) -> StorageResult<Endpoint> {
        Ok(Endpoint {
            id: row.try_get("id")?,
            service_name: row.try_get("service_name")?,
            base_url: row.try_get("base_url")?,
            path: row.try_get("path")?,
            method: Self::parse_column(row, "method")?,
            description: row.try_get("description")?,
            auth_type: row.try_get("auth_type")?,
            is_internal: row.try_get("is_internal")?,
            is_active: row.try_get("is_active")?,
            discovery_source: row.try_get("discovery_source")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
            updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?),
        })
    }

    fn config_from_row(row: &SqliteRow) -> StorageResult<MonitoringConfig> {
        Ok(MonitoringConfig {
            check_interval_seconds: row.try_get::<i64, _>("check_interval_seconds")?.max(0) as u64,
            timeout_seconds: row.try_get::<i64, _>("timeout_seconds")?.max(0) as u64,
            latency_threshold_ms: row.try_get("latency_threshold_ms")?,
            error_rate_threshold: row.try_get("error_rate_threshold")?,
            enabled: row.try_get("enabled")?,
            last_check: row
                .try_get::<Option<i64>, _>("last_check")?
                .map(Self::millis_to_timestamp),
        })
    }

    fn result_from_row(row: &SqliteRow) -> StorageResult<CheckResult> {
        let status_code = row
            .try_get::<Option<i64>, _>("status_code")?
            .map(|code| {
                u16::try_from(code)
                    .map_err(|_| StorageError::InvalidRow(format!("invalid status code {code}")))
            })
            .transpose()?;

        Ok(CheckResult {
            id: row.try_get("id")?,
            endpoint_id: row.try_get("endpoint_id")?,
            status_code,
            response_time_ms: row.try_get("response_time_ms")?,
            success: row.try_get("success")?,
            error_message: row.try_get("error_message")?,
            checked_at: Self::millis_to_timestamp(row.try_get("checked_at")?),
        })
    }

    fn alert_from_row(row: &SqliteRow) -> StorageResult<Alert> {
        Ok(Alert {
            id: row.try_get("id")?,
            endpoint_id: row.try_get("endpoint_id")?,
            alert_type: Self::parse_column(row, "alert_type")?,
            severity: Self::parse_column(row, "severity")?,
            message: row.try_get("message")?,
            threshold_value: row.try_get("threshold_value")?,
            actual_value: row.try_get("actual_value")?,
            is_resolved: row.try_get("is_resolved")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
            resolved_at: row
                .try_get::<Option<i64>, _>("resolved_at")?
                .map(Self::millis_to_timestamp),
        })
    }

    fn event_from_row(row: &SqliteRow) -> StorageResult<AuditEvent> {
        Ok(AuditEvent {
            id: row.try_get("id")?,
            event_type: Self::parse_column(row, "event_type")?,
            endpoint_id: row.try_get("endpoint_id")?,
            message: row.try_get("message")?,
            details: row.try_get("details")?,
            severity: Self::parse_column(row, "severity")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, endpoint), fields(path = %endpoint.path))]
    async fn register_endpoint(&self, endpoint: NewEndpoint) -> StorageResult<EndpointId> {
        let now = Self::timestamp_to_millis(&Utc::now());
        let is_internal = is_internal_url(&endpoint.base_url);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO api_endpoints (
                service_name, base_url, path, method, description, auth_type,
                is_internal, is_active, discovery_source, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
            ON CONFLICT (base_url, path, method) DO UPDATE SET
                service_name = excluded.service_name,
                description = excluded.description,
                auth_type = excluded.auth_type,
                is_internal = excluded.is_internal,
                discovery_source = excluded.discovery_source,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&endpoint.service_name)
        .bind(&endpoint.base_url)
        .bind(&endpoint.path)
        .bind(endpoint.method.as_str())
        .bind(&endpoint.description)
        .bind(&endpoint.auth_type)
        .bind(is_internal)
        .bind(&endpoint.discovery_source)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!("registered endpoint {} ({} {})", id, endpoint.method, endpoint.path);
        Ok(id)
    }

    #[instrument(skip(self, patch))]
    async fn update_endpoint(&self, id: EndpointId, patch: EndpointPatch) -> StorageResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM api_endpoints WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let current = Self::endpoint_from_row(&row)?;

        let result = sqlx::query(
            r#"
            UPDATE api_endpoints SET
                service_name = ?, base_url = ?, path = ?, method = ?, description = ?,
                auth_type = ?, is_internal = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.service_name.unwrap_or(current.service_name))
        .bind(patch.base_url.unwrap_or(current.base_url))
        .bind(patch.path.unwrap_or(current.path))
        .bind(patch.method.unwrap_or(current.method).as_str())
        .bind(patch.description.or(current.description))
        .bind(patch.auth_type.or(current.auth_type))
        .bind(patch.is_internal.unwrap_or(current.is_internal))
        .bind(patch.is_active.unwrap_or(current.is_active))
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM api_endpoints ORDER BY service_name, path"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::endpoint_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_active_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM api_endpoints WHERE is_active = 1 \
             ORDER BY service_name, path"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::endpoint_from_row).collect()
    }

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>> {
        let row = sqlx::query(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM api_endpoints WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::endpoint_from_row).transpose()
    }

    async fn get_monitoring_config(
        &self,
        endpoint_id: EndpointId,
    ) -> StorageResult<Option<MonitoringConfig>> {
        let row = sqlx::query(
            r#"
            SELECT check_interval_seconds, timeout_seconds, latency_threshold_ms,
                   error_rate_threshold, enabled, last_check
            FROM monitoring_config
            WHERE endpoint_id = ?
            "#,
        )
        .bind(endpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::config_from_row).transpose()
    }

    #[instrument(skip(self, config))]
    async fn set_monitoring_config(
        &self,
        endpoint_id: EndpointId,
        config: MonitoringConfig,
    ) -> StorageResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO monitoring_config (
                endpoint_id, check_interval_seconds, timeout_seconds,
                latency_threshold_ms, error_rate_threshold, enabled, last_check
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (endpoint_id) DO UPDATE SET
                check_interval_seconds = excluded.check_interval_seconds,
                timeout_seconds = excluded.timeout_seconds,
                latency_threshold_ms = excluded.latency_threshold_ms,
                error_rate_threshold = excluded.error_rate_threshold,
                enabled = excluded.enabled,
                last_check = excluded.last_check
            RETURNING id
            "#,
        )
        .bind(endpoint_id)
        .bind(config.check_interval_seconds as i64)
        .bind(config.timeout_seconds as i64)
        .bind(config.latency_threshold_ms)
        .bind(config.error_rate_threshold)
        .bind(config.enabled)
        .bind(config.last_check.as_ref().map(Self::timestamp_to_millis))
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn mark_checked(&self, endpoint_id: EndpointId, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitoring_config (endpoint_id, last_check)
            VALUES (?, ?)
            ON CONFLICT (endpoint_id) DO UPDATE SET last_check = excluded.last_check
            "#,
        )
        .bind(endpoint_id)
        .bind(Self::timestamp_to_millis(&at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, result), fields(endpoint_id = result.endpoint_id))]
    async fn record_check_result(&self, result: NewCheckResult) -> StorageResult<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO monitoring_results (
                endpoint_id, status_code, response_time_ms, success, error_message, checked_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.endpoint_id)
        .bind(result.status_code.map(i64::from))
        .bind(result.response_time_ms)
        .bind(result.success)
        .bind(&result.error_message)
        .bind(Self::timestamp_to_millis(&result.checked_at))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    async fn list_check_results(
        &self,
        endpoint_id: Option<EndpointId>,
        limit: usize,
    ) -> StorageResult<Vec<CheckResult>> {
        let rows = match endpoint_id {
            Some(endpoint_id) => {
                sqlx::query(&format!(
                    "SELECT {RESULT_COLUMNS} FROM monitoring_results WHERE endpoint_id = ? \
                     ORDER BY checked_at DESC, id DESC LIMIT ?"
                ))
                .bind(endpoint_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {RESULT_COLUMNS} FROM monitoring_results \
                     ORDER BY checked_at DESC, id DESC LIMIT ?"
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::result_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn compute_window_stats(&self, since: DateTime<Utc>) -> StorageResult<MonitoringStats> {
        let (total, successful, avg, last): (i64, i64, Option<f64>, Option<i64>) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0),
                    AVG(response_time_ms),
                    MAX(checked_at)
                FROM monitoring_results
                WHERE checked_at >= ?
                "#,
            )
            .bind(Self::timestamp_to_millis(&since))
            .fetch_one(&self.pool)
            .await?;

        Ok(MonitoringStats::from_aggregates(
            total.max(0) as u64,
            successful.max(0) as u64,
            avg,
            last.map(Self::millis_to_timestamp),
        ))
    }

    #[instrument(skip(self, intent), fields(endpoint_id = intent.endpoint_id, alert_type = %intent.alert_type))]
    async fn create_alert(&self, intent: AlertIntent) -> StorageResult<AlertId> {
        let id = sqlx::query(
            r#"
            INSERT INTO alerts (
                endpoint_id, alert_type, severity, message,
                threshold_value, actual_value, is_resolved, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(intent.endpoint_id)
        .bind(intent.alert_type.as_str())
        .bind(intent.severity.as_str())
        .bind(&intent.message)
        .bind(intent.threshold_value)
        .bind(intent.actual_value)
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    async fn get_alert(&self, id: AlertId) -> StorageResult<Option<Alert>> {
        let row = sqlx::query(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::alert_from_row).transpose()
    }

    async fn list_active_alerts(
        &self,
        endpoint_id: Option<EndpointId>,
    ) -> StorageResult<Vec<Alert>> {
        let rows = match endpoint_id {
            Some(endpoint_id) => {
                sqlx::query(&format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts WHERE is_resolved = 0 AND endpoint_id = ? \
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(endpoint_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts WHERE is_resolved = 0 \
                     ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::alert_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn resolve_alert(&self, id: AlertId) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE alerts SET is_resolved = 1, resolved_at = ? WHERE id = ? AND is_resolved = 0",
        )
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn log_event(&self, event: NewAuditEvent) -> StorageResult<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO event_logs (event_type, endpoint_id, message, details, severity, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.event_type.as_str())
        .bind(event.endpoint_id)
        .bind(&event.message)
        .bind(&event.details)
        .bind(event.severity.as_str())
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    async fn list_events(
        &self,
        event_type: Option<EventType>,
        limit: usize,
    ) -> StorageResult<Vec<AuditEvent>> {
        let columns = "id, event_type, endpoint_id, message, details, severity, created_at";
        let rows = match event_type {
            Some(event_type) => {
                sqlx::query(&format!(
                    "SELECT {columns} FROM event_logs WHERE event_type = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ?"
                ))
                .bind(event_type.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {columns} FROM event_logs ORDER BY created_at DESC, id DESC LIMIT ?"
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::event_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
