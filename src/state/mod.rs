/// Round lifecycle controller.
pub mod lifecycle;
/// Round phase classification.
pub mod phase;
/// Online presence aggregation.
pub mod presence;
mod sse;
/// Winner selection and persistence.
pub mod winner;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::round_store::RoundStore,
    error::ServiceError,
    metrics::OperationMetrics,
    rate_limit::RateLimiter,
    state::{lifecycle::RoundLifecycle, presence::PresenceAggregator},
};

pub use self::sse::SseHub;

/// Handle to the application state shared by every task and handler.
pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Central application state shared by every request handler and background task.
pub struct AppState {
    round_store: RwLock<Option<Arc<dyn RoundStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    lifecycle: RoundLifecycle,
    limiter: RateLimiter,
    presence: PresenceAggregator,
    metrics: Arc<OperationMetrics>,
    sse: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let metrics = Arc::new(OperationMetrics::default());
        Arc::new(Self {
            round_store: RwLock::new(None),
            degraded: degraded_tx,
            lifecycle: RoundLifecycle::new(config.preparation_window, metrics.clone()),
            limiter: RateLimiter::from_config(&config),
            presence: PresenceAggregator::new(config.presence_throttle),
            metrics,
            sse: SseHub::new(SSE_CAPACITY),
            config,
        })
    }

    /// Obtain a handle to the current round store, if one is installed.
    pub async fn round_store(&self) -> Option<Arc<dyn RoundStore>> {
        let guard = self.round_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current round store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_round_store(&self) -> Result<Arc<dyn RoundStore>, ServiceError> {
        self.round_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new round store implementation and leave degraded mode.
    /// Returns whether the degraded flag changed.
    pub async fn install_round_store(&self, store: Arc<dyn RoundStore>) -> bool {
        {
            let mut guard = self.round_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false)
    }

    /// Remove the current round store and enter degraded mode.
    pub async fn clear_round_store(&self) -> bool {
        {
            let mut guard = self.round_store.write().await;
            guard.take();
        }
        self.update_degraded(true)
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag. Returns whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Lifecycle controller shared by request handlers and the scheduler.
    pub fn lifecycle(&self) -> &RoundLifecycle {
        &self.lifecycle
    }

    /// Request limits and per-round quotas.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Online presence aggregator.
    pub fn presence(&self) -> &PresenceAggregator {
        &self.presence
    }

    /// Operation timings.
    pub fn metrics(&self) -> &OperationMetrics {
        &self.metrics
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::round_store::MemoryRoundStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_round_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_round_store(Arc::new(MemoryRoundStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_round_store().await;
        assert!(state.is_degraded());
        assert!(state.round_store().await.is_none());
    }
}
