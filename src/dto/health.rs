//! Health check payloads.

use serde::Serialize;
use utoipa::ToSchema;

/// Reachability of the round store as seen by the last health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageStatus {
    /// The last probe succeeded.
    Connected,
    /// The last probe failed.
    Unreachable,
    /// No backend installed yet (degraded mode).
    Missing,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: &'static str,
    /// Round store reachability.
    pub storage: StorageStatus,
    /// Distinct clients connected to the presence socket.
    pub online: usize,
}

impl HealthResponse {
    /// Summarise the service state for the health route.
    pub fn new(degraded: bool, storage: StorageStatus, online: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" },
            storage,
            online,
        }
    }
}
