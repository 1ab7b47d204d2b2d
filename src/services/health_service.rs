use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageStatus},
    state::SharedState,
};

/// Probe the round store and report degraded mode with the online count.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.round_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageStatus::Connected,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                StorageStatus::Unreachable
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            StorageStatus::Missing
        }
    };

    HealthResponse::new(state.is_degraded(), storage, state.presence().online())
}
