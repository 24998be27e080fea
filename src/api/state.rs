//! API shared state

use std::sync::Arc;

use crate::coordinator::MonitoringCoordinator;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// The coordinator also gives access to storage and the alert manager
    pub coordinator: Arc<MonitoringCoordinator>,
}

impl ApiState {
    pub fn new(coordinator: Arc<MonitoringCoordinator>) -> Self {
        Self { coordinator }
    }
}
