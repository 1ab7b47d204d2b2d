//! Round reads and administrative round operations.

use std::{cmp::Reverse, time::SystemTime};

use tracing::{info, warn};

use crate::{
    dao::models::GameMode,
    dto::{
        format_system_time,
        post::{PostSummary, RoundPostsResponse},
        round::{
            CreateRoundRequest, CreateRoundResponse, DebugResponse, DebugRound, ResetOutcome,
            ResetResponse, RoundStatusResponse, RoundSummary, RoundWinnerResponse, WinnerSummary,
        },
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, winner},
};

/// Evaluate the lifecycle of `mode` and return its current round.
pub async fn current_round(
    state: &SharedState,
    mode: GameMode,
) -> Result<RoundStatusResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let now = SystemTime::now();
    let status = state.lifecycle().tick(store.as_ref(), mode, now).await?;
    Ok(RoundStatusResponse::new(&status, now))
}

/// Recorded winner of `round_id`. Empty until the round has been resolved.
pub async fn round_winner(
    state: &SharedState,
    round_id: String,
) -> Result<RoundWinnerResponse, ServiceError> {
    let store = state.require_round_store().await?;
    if store.find_round(round_id.clone()).await?.is_none() {
        return Err(ServiceError::NotFound(format!("round `{round_id}` not found")));
    }

    let winner = winner::winner_for_round(store.as_ref(), &round_id).await?;
    Ok(RoundWinnerResponse {
        round_id,
        winner: winner.as_ref().map(WinnerSummary::from),
    })
}

/// Posts of `round_id`, best net score first and oldest first among ties.
pub async fn round_posts(
    state: &SharedState,
    round_id: String,
) -> Result<RoundPostsResponse, ServiceError> {
    let store = state.require_round_store().await?;
    if store.find_round(round_id.clone()).await?.is_none() {
        return Err(ServiceError::NotFound(format!("round `{round_id}` not found")));
    }

    let mut posts = store.posts_for_round(round_id.clone()).await?;
    posts.sort_by_key(|post| (Reverse(post.net_score()), post.created_at, post.id));

    Ok(RoundPostsResponse {
        round_id,
        posts: posts.iter().map(PostSummary::from).collect(),
    })
}

/// End any live round of the requested mode and start a new one now.
pub async fn create_round(
    state: &SharedState,
    request: CreateRoundRequest,
) -> Result<CreateRoundResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let mode = request.game_mode;
    let now = SystemTime::now();

    let round = state
        .lifecycle()
        .force_rollover(store.as_ref(), mode, now)
        .await?;
    announce(state, mode).await;

    Ok(CreateRoundResponse {
        message: format!("started {} round #{}", mode, round.round_number),
        round: RoundSummary::from(&round),
    })
}

/// Restart every configured mode. One failing mode does not stop the others.
pub async fn reset(state: &SharedState) -> Result<ResetResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let modes = state.config().game_modes.clone();
    let mut results = Vec::with_capacity(modes.len());

    for mode in modes {
        let outcome = state
            .lifecycle()
            .force_rollover(store.as_ref(), mode, SystemTime::now())
            .await;
        results.push(match outcome {
            Ok(round) => {
                announce(state, mode).await;
                ResetOutcome {
                    game_mode: mode,
                    success: true,
                    round_id: Some(round.id),
                    round_number: Some(round.round_number),
                    error: None,
                }
            }
            Err(err) => {
                warn!(game_mode = %mode, error = %err, "failed to reset mode");
                ResetOutcome {
                    game_mode: mode,
                    success: false,
                    round_id: None,
                    round_number: None,
                    error: Some(err.to_string()),
                }
            }
        });
    }

    let restarted = results.iter().filter(|outcome| outcome.success).count();
    info!(restarted, total = results.len(), "round reset completed");
    Ok(ResetResponse {
        message: format!("reset {restarted} of {} modes", results.len()),
        results,
    })
}

/// Every stored round with its timing against the server clock, newest first.
pub async fn debug(state: &SharedState) -> Result<DebugResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let now = SystemTime::now();
    let preparation = state.lifecycle().preparation();

    let rounds: Vec<DebugRound> = store
        .list_rounds()
        .await?
        .iter()
        .map(|round| DebugRound::new(round, round.phase_at(now, preparation), now))
        .collect();

    Ok(DebugResponse {
        current_time: format_system_time(now),
        total_rounds: rounds.len(),
        rounds,
        operations: state.metrics().summary(),
    })
}

/// Push the fresh round of `mode` to SSE subscribers.
async fn announce(state: &SharedState, mode: GameMode) {
    let Some(store) = state.round_store().await else {
        return;
    };
    match state
        .lifecycle()
        .tick(store.as_ref(), mode, SystemTime::now())
        .await
    {
        Ok(status) => sse_events::broadcast_round_phase(state, &status),
        Err(err) => warn!(game_mode = %mode, error = %err, "failed to announce new round"),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{PostEntity, RoundEntity},
            round_store::{MemoryRoundStore, RoundStore},
        },
        dto::phase::VisibleRoundPhase,
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, MemoryRoundStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn degraded_mode_is_reported() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            current_round(&state, GameMode::Short).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn current_round_opens_the_first_round() {
        let (state, store) = state_with_store().await;

        let status = current_round(&state, GameMode::Medium).await.unwrap();
        assert_eq!(status.round.id, "medium_round-1");
        assert_eq!(status.phase, VisibleRoundPhase::Active);
        assert_eq!(store.list_rounds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_round_is_not_found() {
        let (state, _store) = state_with_store().await;
        assert!(matches!(
            round_winner(&state, "short_round-9".into()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            round_posts(&state, "short_round-9".into()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn posts_are_ranked_by_net_score() {
        let (state, store) = state_with_store().await;
        let start = SystemTime::now();
        let round = RoundEntity::open(GameMode::Short, 1, start);
        store.insert_round(round.clone()).await.unwrap();

        let mut low = PostEntity::new("low", Uuid::new_v4(), &round.id, start);
        low.upvotes = 1;
        let mut high = PostEntity::new(
            "high",
            Uuid::new_v4(),
            &round.id,
            start + Duration::from_secs(1),
        );
        high.upvotes = 4;
        store.insert_post(low).await.unwrap();
        store.insert_post(high).await.unwrap();

        let response = round_posts(&state, round.id).await.unwrap();
        let contents: Vec<_> = response.posts.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, ["high", "low"]);
    }

    #[tokio::test]
    async fn winner_is_empty_while_active() {
        let (state, _store) = state_with_store().await;
        let status = current_round(&state, GameMode::Long).await.unwrap();

        let response = round_winner(&state, status.round.id).await.unwrap();
        assert!(response.winner.is_none());
    }

    #[tokio::test]
    async fn manual_creation_replaces_the_live_round() {
        let (state, store) = state_with_store().await;
        current_round(&state, GameMode::Short).await.unwrap();

        let created = create_round(
            &state,
            CreateRoundRequest {
                game_mode: GameMode::Short,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.round.id, "short_round-2");

        let active = store.active_rounds(GameMode::Short).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "short_round-2");
    }

    #[tokio::test]
    async fn reset_restarts_every_configured_mode() {
        let (state, _store) = state_with_store().await;
        let response = reset(&state).await.unwrap();

        assert_eq!(response.results.len(), GameMode::ALL.len());
        assert!(response.results.iter().all(|outcome| outcome.success));
        assert_eq!(response.message, "reset 3 of 3 modes");
    }

    #[tokio::test]
    async fn debug_lists_rounds_and_timings() {
        let (state, _store) = state_with_store().await;
        current_round(&state, GameMode::Short).await.unwrap();
        current_round(&state, GameMode::Long).await.unwrap();

        let dump = debug(&state).await.unwrap();
        assert_eq!(dump.total_rounds, 2);
        assert!(dump.rounds.iter().all(|round| !round.is_expired));
        assert!(dump.operations.contains_key("round.tick"));
    }
}
