//! API Sentinel
//!
//! Probes registered HTTP endpoints, evaluates latency, availability and
//! error-rate thresholds, and keeps an alert and audit trail in a storage
//! backend.

pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod coordinator;
pub mod inventory;
pub mod monitors;
pub mod storage;
pub mod util;
