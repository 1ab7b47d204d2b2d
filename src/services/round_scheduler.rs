//! Background tasks: the per-process lifecycle driver and the limiter sweeper.

use std::{
    collections::{HashMap, HashSet},
    time::SystemTime,
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    dao::models::GameMode,
    rate_limit::SweepReport,
    services::sse_events,
    state::{SharedState, lifecycle::RoundStatus, phase::RoundPhase},
};

/// Last state published for a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    round_id: String,
    phase: RoundPhase,
    winner_announced: bool,
}

/// Tick every configured mode on a fixed interval, publishing phase changes
/// and winners. Runs for the lifetime of the process.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seen = HashMap::new();

    info!(
        modes = state.config().game_modes.len(),
        interval_ms = state.config().tick_interval.as_millis() as u64,
        "round scheduler started"
    );
    loop {
        ticker.tick().await;
        tick_modes(&state, &mut seen, SystemTime::now()).await;
    }
}

/// Periodically evict idle quota entries and expired request windows.
pub async fn run_limiter_sweep(state: SharedState) {
    let mut ticker = interval(state.config().quota_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = state.limiter().sweep(SystemTime::now());
        if report != SweepReport::default() {
            debug!(
                idle_ips = report.idle_ips,
                expired_windows = report.expired_windows,
                "limiter sweep"
            );
        }
    }
}

/// One pass over every mode. Returns whether every mode ticked successfully.
///
/// Per-round quotas of rounds that are no longer current are released only
/// after a complete pass, so a storage hiccup never wipes live counters.
async fn tick_modes(
    state: &SharedState,
    seen: &mut HashMap<GameMode, Observed>,
    now: SystemTime,
) -> bool {
    let Some(store) = state.round_store().await else {
        return false;
    };

    let mut current = HashSet::new();
    let mut complete = true;
    for &mode in &state.config().game_modes {
        match state.lifecycle().tick(store.as_ref(), mode, now).await {
            Ok(status) => {
                current.insert(status.round.id.clone());
                publish_changes(state, seen, &status);
            }
            Err(err) => {
                complete = false;
                warn!(game_mode = %mode, error = %err, "scheduled round tick failed");
            }
        }
    }

    if complete {
        let released = state.limiter().quota().cleanup_old_rounds(&current);
        if released > 0 {
            debug!(released, "released quotas of finished rounds");
        }
    }
    complete
}

fn publish_changes(
    state: &SharedState,
    seen: &mut HashMap<GameMode, Observed>,
    status: &RoundStatus,
) {
    let mode = status.round.game_mode;
    let previous = seen
        .get(&mode)
        .filter(|observed| observed.round_id == status.round.id);

    if previous.is_none_or(|observed| observed.phase != status.phase) {
        sse_events::broadcast_round_phase(state, status);
    }

    let mut winner_announced = previous.is_some_and(|observed| observed.winner_announced);
    if !winner_announced {
        if let Some(winner) = &status.winner {
            sse_events::broadcast_round_winner(state, status, winner);
            winner_announced = true;
        }
    }

    seen.insert(
        mode,
        Observed {
            round_id: status.round.id.clone(),
            phase: status.phase,
            winner_announced,
        },
    );
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::broadcast::{Receiver, error::TryRecvError};
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PostEntity,
            round_store::{MemoryRoundStore, RoundStore},
        },
        dto::sse::ServerEvent,
        state::AppState,
    };

    fn short_only() -> AppConfig {
        AppConfig {
            game_modes: vec![GameMode::Short],
            ..AppConfig::default()
        }
    }

    fn drain(receiver: &mut Receiver<ServerEvent>) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => names.push(event.event.unwrap_or_default()),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        names
    }

    #[tokio::test]
    async fn degraded_state_skips_the_pass() {
        let state = AppState::new(short_only());
        assert!(!tick_modes(&state, &mut HashMap::new(), SystemTime::now()).await);
    }

    #[tokio::test]
    async fn phase_changes_and_winner_are_published_once() {
        let state = AppState::new(short_only());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;
        let mut events = state.public_sse().subscribe();
        let mut seen = HashMap::new();
        let start = SystemTime::now();

        assert!(tick_modes(&state, &mut seen, start).await);
        assert_eq!(drain(&mut events), ["round.phase"]);

        tick_modes(&state, &mut seen, start + Duration::from_secs(10)).await;
        assert!(drain(&mut events).is_empty());

        let post = PostEntity::new("gm", Uuid::new_v4(), "short_round-1", start);
        store.insert_post(post).await.unwrap();

        tick_modes(&state, &mut seen, start + Duration::from_secs(61)).await;
        assert_eq!(drain(&mut events), ["round.phase", "round.winner"]);

        tick_modes(&state, &mut seen, start + Duration::from_secs(70)).await;
        assert!(drain(&mut events).is_empty());

        tick_modes(&state, &mut seen, start + Duration::from_secs(95)).await;
        assert_eq!(drain(&mut events), ["round.phase"]);
        assert_eq!(seen[&GameMode::Short].round_id, "short_round-2");
    }

    #[tokio::test]
    async fn quotas_of_finished_rounds_are_released() {
        let state = AppState::new(short_only());
        state
            .install_round_store(Arc::new(MemoryRoundStore::new()))
            .await;
        state.limiter().quota().record_post("1.1.1.1", "short_round-0");

        assert!(tick_modes(&state, &mut HashMap::new(), SystemTime::now()).await);
        assert_eq!(state.limiter().quota().tracked_rounds(), 0);
    }

    #[tokio::test]
    async fn failed_pass_keeps_quotas() {
        let state = AppState::new(short_only());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;
        state.limiter().quota().record_post("1.1.1.1", "short_round-0");

        store.set_offline(true);
        assert!(!tick_modes(&state, &mut HashMap::new(), SystemTime::now()).await);
        assert_eq!(state.limiter().quota().tracked_rounds(), 1);
    }
}
