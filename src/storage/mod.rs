//! Storage backends for the monitoring engine
//!
//! All durable state (endpoints, monitoring configuration, check results,
//! alerts and the audit log) goes through the `StorageBackend` trait.
//!
//! ## Backends
//!
//! - **SQLite** (default, feature `storage-sqlite`): embedded database
//! - **In-Memory**: no persistence, for tests and ephemeral runs
//!
//! ## Usage
//!
//! ```no_run
//! use api_sentinel::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./sentinel.db").await?;
//!     let endpoints = backend.list_active_endpoints().await?;
//!     println!("{} active endpoints", endpoints.len());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

/// Open the backend described by the configuration
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, nothing will be persisted");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Ok(Arc::new(sqlite::SqliteBackend::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "SQLite support is not compiled in (enable the storage-sqlite feature)".to_string(),
        )),
    }
}
