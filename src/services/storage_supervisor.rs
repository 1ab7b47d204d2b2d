use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{round_store::RoundStore, storage::StorageError},
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the round store and keep the shared state in degraded mode while
/// it is unavailable. Never returns.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoundStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                if state.install_round_store(store.clone()).await {
                    sse_events::broadcast_system_status(&state, false);
                }
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !supervise(&state, store.as_ref()).await && state.clear_round_store().await {
                    sse_events::broadcast_system_status(&state, true);
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until reconnection attempts are exhausted. Returns `false`
/// once the connection should be rebuilt from scratch.
async fn supervise(state: &SharedState, store: &dyn RoundStore) -> bool {
    loop {
        if store.health_check().await.is_ok() {
            if set_degraded(state, false) {
                info!("storage healthy again; leaving degraded mode");
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "storage reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "storage reconnect first attempt failed; entering degraded mode"
                        );
                        set_degraded(state, true);
                    } else {
                        warn!(attempt, error = %err, "storage reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            warn!("exhausted storage reconnect attempts; staying in degraded mode");
            return false;
        }
        set_degraded(state, false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Flip the degraded flag, telling SSE subscribers when it actually changed.
fn set_degraded(state: &SharedState, degraded: bool) -> bool {
    let changed = state.update_degraded(degraded);
    if changed {
        sse_events::broadcast_system_status(state, degraded);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::round_store::MemoryRoundStore, state::AppState};

    #[tokio::test]
    async fn installs_the_store_once_connected() {
        let state = AppState::new(AppConfig::default());
        let mut events = state.public_sse().subscribe();
        let mut attempts = 0;

        let task = tokio::spawn(run(state.clone(), move || {
            attempts += 1;
            let outcome: Result<Arc<dyn RoundStore>, StorageError> = if attempts < 2 {
                Err(StorageError::unavailable(
                    "not yet".into(),
                    std::io::Error::other("refused"),
                ))
            } else {
                Ok(Arc::new(MemoryRoundStore::new()))
            };
            async move { outcome }
        }));

        sleep(INITIAL_DELAY + Duration::from_millis(300)).await;
        assert!(!state.is_degraded());
        assert!(state.round_store().await.is_some());
        assert_eq!(
            events.try_recv().unwrap().event.as_deref(),
            Some("system_status")
        );
        task.abort();
    }

    #[tokio::test]
    async fn offline_store_drops_back_to_degraded() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        let handle = store.clone();
        store.set_offline(true);

        let task = tokio::spawn(run(state.clone(), move || {
            let store: Arc<dyn RoundStore> = Arc::new(handle.clone());
            async move { Ok(store) }
        }));

        sleep(Duration::from_millis(100)).await;
        assert!(state.is_degraded());
        task.abort();
    }
}
