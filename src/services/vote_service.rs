use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dao::{
        models::{PostEntity, VoteEntity},
        round_store::RoundStore,
    },
    dto::vote::{CastVoteRequest, CastVoteResponse},
    error::ServiceError,
    rate_limit::RateCategory,
    services::{post_service::ensure_accepting, user_service},
    state::SharedState,
};

const ALREADY_VOTED: &str = "already voted on this post";

/// Record one vote from `ip` on a post of the current round.
pub async fn cast_vote(
    state: &SharedState,
    ip: &str,
    request: CastVoteRequest,
) -> Result<CastVoteResponse, ServiceError> {
    let decision = state.limiter().window().check(ip, RateCategory::Vote);
    if !decision.success {
        return Err(ServiceError::rate_limited("too many vote requests", decision));
    }

    state
        .metrics()
        .observe("votes.cast", store_vote(state, ip, request))
        .await
}

async fn store_vote(
    state: &SharedState,
    ip: &str,
    request: CastVoteRequest,
) -> Result<CastVoteResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let now = SystemTime::now();

    let round = store
        .find_round(request.round_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("round `{}` not found", request.round_id)))?;
    ensure_accepting(&round, now, state.lifecycle().preparation())?;

    let post = store
        .find_post(request.post_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("post `{}` not found", request.post_id)))?;
    if post.round_id != round.id {
        return Err(ServiceError::InvalidInput(format!(
            "post `{}` does not belong to round `{}`",
            post.id, round.id
        )));
    }

    let quota = state.limiter().quota();
    if !quota.try_reserve_vote(ip, &round.id, now) {
        return Err(ServiceError::RateLimited {
            message: "vote limit reached for this round".into(),
            remaining: 0,
            reset_at: round.end_time,
        });
    }

    let stored = insert_vote(store.as_ref(), &post, &request, now).await;
    if stored.is_err() {
        quota.release_vote(ip, &round.id);
    }
    stored?;

    if let Err(err) = store.increment_post_votes(post.id, request.vote_type).await {
        warn!(post_id = %post.id, error = %err, "vote stored but counter update failed");
    }

    info!(
        round_id = %round.id,
        post_id = %post.id,
        vote_type = request.vote_type.counter_field(),
        "vote accepted"
    );
    Ok(CastVoteResponse {
        success: true,
        remaining_votes: quota.remaining_votes(ip, &round.id),
    })
}

async fn insert_vote(
    store: &dyn RoundStore,
    post: &PostEntity,
    request: &CastVoteRequest,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let voter = user_service::get_or_create_user(store, request.wallet_address.trim(), now).await?;
    if store.find_vote(post.id, voter.id).await?.is_some() {
        return Err(ServiceError::Conflict(ALREADY_VOTED.into()));
    }

    let vote = VoteEntity::new(post.id, voter.id, request.vote_type, now);
    store.insert_vote(vote).await.map_err(|err| {
        if err.is_conflict() {
            ServiceError::Conflict(ALREADY_VOTED.into())
        } else {
            err.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{GameMode, RoundEntity, VoteType},
            round_store::MemoryRoundStore,
        },
        state::{AppState, SharedState},
    };

    async fn setup() -> (SharedState, MemoryRoundStore, RoundEntity, PostEntity) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;

        let now = SystemTime::now();
        let round = RoundEntity::open(GameMode::Short, 1, now);
        store.insert_round(round.clone()).await.unwrap();
        let post = PostEntity::new("gm", Uuid::new_v4(), &round.id, now);
        store.insert_post(post.clone()).await.unwrap();
        (state, store, round, post)
    }

    fn request(round: &RoundEntity, post: &PostEntity, wallet: &str) -> CastVoteRequest {
        CastVoteRequest {
            post_id: post.id,
            wallet_address: wallet.into(),
            vote_type: VoteType::Upvote,
            round_id: round.id.clone(),
        }
    }

    #[tokio::test]
    async fn vote_updates_counters_and_quota() {
        let (state, store, round, post) = setup().await;

        let response = cast_vote(&state, "1.1.1.1", request(&round, &post, "0xabc"))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.remaining_votes, 9);

        let stored = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.upvotes, 1);
    }

    #[tokio::test]
    async fn repeated_vote_conflicts() {
        let (state, store, round, post) = setup().await;
        cast_vote(&state, "1.1.1.1", request(&round, &post, "0xabc"))
            .await
            .unwrap();

        let err = cast_vote(&state, "2.2.2.2", request(&round, &post, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(message) if message == ALREADY_VOTED));
        assert_eq!(store.find_post(post.id).await.unwrap().unwrap().upvotes, 1);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_rate_limited() {
        let (state, store, round, _post) = setup().await;
        let quota = state.limiter().quota();
        for _ in 0..quota.votes_per_round() {
            quota.record_vote("1.1.1.1", &round.id);
        }
        let other = PostEntity::new("other", Uuid::new_v4(), &round.id, SystemTime::now());
        store.insert_post(other.clone()).await.unwrap();

        let err = cast_vote(&state, "1.1.1.1", request(&round, &other, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn repeated_vote_hands_back_the_ip_slot() {
        let (state, _store, round, post) = setup().await;
        cast_vote(&state, "1.1.1.1", request(&round, &post, "0xabc"))
            .await
            .unwrap();
        let quota = state.limiter().quota();
        let before = quota.remaining_votes("1.1.1.1", &round.id);

        cast_vote(&state, "1.1.1.1", request(&round, &post, "0xabc"))
            .await
            .unwrap_err();
        assert_eq!(quota.remaining_votes("1.1.1.1", &round.id), before);
    }

    #[tokio::test]
    async fn concurrent_votes_never_exceed_the_quota() {
        let (state, store, round, _post) = setup().await;
        let quota = state.limiter().quota();
        for _ in 1..quota.votes_per_round() {
            quota.record_vote("1.1.1.1", &round.id);
        }
        let now = SystemTime::now();
        let first = PostEntity::new("a", Uuid::new_v4(), &round.id, now);
        let second = PostEntity::new("b", Uuid::new_v4(), &round.id, now);
        store.insert_post(first.clone()).await.unwrap();
        store.insert_post(second.clone()).await.unwrap();

        let (a, b) = tokio::join!(
            cast_vote(&state, "1.1.1.1", request(&round, &first, "0xabc")),
            cast_vote(&state, "1.1.1.1", request(&round, &second, "0xabc")),
        );
        assert_eq!([a, b].iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert_eq!(quota.remaining_votes("1.1.1.1", &round.id), 0);
    }

    #[tokio::test]
    async fn post_from_another_round_is_rejected() {
        let (state, store, round, _post) = setup().await;
        let foreign =
            PostEntity::new("elsewhere", Uuid::new_v4(), "long_round-1", SystemTime::now());
        store.insert_post(foreign.clone()).await.unwrap();

        let err = cast_vote(&state, "1.1.1.1", request(&round, &foreign, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_post_is_not_found() {
        let (state, _store, round, _post) = setup().await;
        let ghost = PostEntity::new("ghost", Uuid::new_v4(), &round.id, SystemTime::now());

        let err = cast_vote(&state, "1.1.1.1", request(&round, &ghost, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
