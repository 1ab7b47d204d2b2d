use std::time::{Duration, SystemTime};

use tracing::info;

use crate::{
    dao::{
        models::{PostEntity, RoundEntity},
        round_store::RoundStore,
    },
    dto::post::{CreatePostRequest, CreatePostResponse, PostSummary},
    error::ServiceError,
    rate_limit::RateCategory,
    services::user_service,
    state::{SharedState, phase::RoundPhase},
};

const ALREADY_POSTED: &str = "already posted in this round";

/// Reject writes to a round that is no longer taking posts or votes.
pub(crate) fn ensure_accepting(
    round: &RoundEntity,
    now: SystemTime,
    preparation: Duration,
) -> Result<(), ServiceError> {
    if !round.is_live() || round.phase_at(now, preparation) != RoundPhase::Active {
        return Err(ServiceError::InvalidState(format!(
            "round `{}` is not accepting submissions",
            round.id
        )));
    }
    Ok(())
}

/// Accept one post from `ip` into the round named by the request.
pub async fn submit_post(
    state: &SharedState,
    ip: &str,
    request: CreatePostRequest,
) -> Result<CreatePostResponse, ServiceError> {
    let decision = state.limiter().window().check(ip, RateCategory::Post);
    if !decision.success {
        return Err(ServiceError::rate_limited("too many post requests", decision));
    }

    state
        .metrics()
        .observe("posts.submit", store_post(state, ip, request))
        .await
}

async fn store_post(
    state: &SharedState,
    ip: &str,
    request: CreatePostRequest,
) -> Result<CreatePostResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let now = SystemTime::now();

    let round = store
        .find_round(request.round_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("round `{}` not found", request.round_id)))?;
    ensure_accepting(&round, now, state.lifecycle().preparation())?;

    let quota = state.limiter().quota();
    if !quota.try_reserve_post(ip, &round.id, now) {
        return Err(ServiceError::RateLimited {
            message: "post limit reached for this round".into(),
            remaining: 0,
            reset_at: round.end_time,
        });
    }

    let stored = insert_post(store.as_ref(), &round, request, now).await;
    if stored.is_err() {
        quota.release_post(ip, &round.id);
    }
    let post = stored?;

    info!(round_id = %round.id, post_id = %post.id, author_id = %post.author_id, "post accepted");
    Ok(CreatePostResponse {
        success: true,
        post: PostSummary::from(&post),
    })
}

async fn insert_post(
    store: &dyn RoundStore,
    round: &RoundEntity,
    request: CreatePostRequest,
    now: SystemTime,
) -> Result<PostEntity, ServiceError> {
    let author = user_service::get_or_create_user(store, request.wallet_address.trim(), now).await?;
    if store
        .find_post_by_author(round.id.clone(), author.id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(ALREADY_POSTED.into()));
    }

    let post = PostEntity::new(request.content.trim(), author.id, &round.id, now);
    store.insert_post(post.clone()).await.map_err(|err| {
        if err.is_conflict() {
            ServiceError::Conflict(ALREADY_POSTED.into())
        } else {
            err.into()
        }
    })?;
    Ok(post)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::GameMode,
            round_store::{MemoryRoundStore, RoundStore},
        },
        state::AppState,
    };

    async fn setup() -> (SharedState, MemoryRoundStore, RoundEntity) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;
        let round = RoundEntity::open(GameMode::Short, 1, SystemTime::now());
        store.insert_round(round.clone()).await.unwrap();
        (state, store, round)
    }

    fn request(round_id: &str, wallet: &str) -> CreatePostRequest {
        CreatePostRequest {
            content: "  gm frens  ".into(),
            wallet_address: wallet.into(),
            round_id: round_id.into(),
        }
    }

    #[tokio::test]
    async fn post_is_stored_and_counted() {
        let (state, store, round) = setup().await;

        let response = submit_post(&state, "1.1.1.1", request(&round.id, "0xabc"))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.post.content, "gm frens");

        let posts = store.posts_for_round(round.id.clone()).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(!state.limiter().quota().check_post_limit("1.1.1.1", &round.id));
    }

    #[tokio::test]
    async fn second_post_from_the_same_ip_is_rate_limited() {
        let (state, _store, round) = setup().await;
        submit_post(&state, "1.1.1.1", request(&round.id, "0xabc"))
            .await
            .unwrap();

        let err = submit_post(&state, "1.1.1.1", request(&round.id, "0xdef"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { remaining: 0, .. }));
    }

    #[tokio::test]
    async fn second_post_from_the_same_wallet_conflicts() {
        let (state, _store, round) = setup().await;
        submit_post(&state, "1.1.1.1", request(&round.id, "0xabc"))
            .await
            .unwrap();

        let err = submit_post(&state, "2.2.2.2", request(&round.id, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(message) if message == ALREADY_POSTED));
    }

    #[tokio::test]
    async fn concurrent_posts_from_one_ip_admit_one() {
        let (state, store, round) = setup().await;

        let (first, second) = tokio::join!(
            submit_post(&state, "1.1.1.1", request(&round.id, "0xabc")),
            submit_post(&state, "1.1.1.1", request(&round.id, "0xdef")),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|outcome| matches!(outcome, Err(ServiceError::RateLimited { .. })))
        );
        assert_eq!(store.posts_for_round(round.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_post_hands_back_the_ip_slot() {
        let (state, _store, round) = setup().await;
        submit_post(&state, "1.1.1.1", request(&round.id, "0xabc"))
            .await
            .unwrap();

        let err = submit_post(&state, "2.2.2.2", request(&round.id, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        submit_post(&state, "2.2.2.2", request(&round.id, "0xdef"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ended_round_rejects_posts() {
        let (state, store, round) = setup().await;
        store.end_round(round.id.clone()).await.unwrap();

        let err = submit_post(&state, "1.1.1.1", request(&round.id, "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn unknown_round_is_not_found() {
        let (state, _store, _round) = setup().await;
        let err = submit_post(&state, "1.1.1.1", request("short_round-77", "0xabc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn preparation_phase_is_closed_for_writes() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let round = RoundEntity::open(GameMode::Short, 1, start);
        let preparation = Duration::from_secs(30);

        assert!(ensure_accepting(&round, start + Duration::from_secs(59), preparation).is_ok());
        assert!(ensure_accepting(&round, start + Duration::from_secs(60), preparation).is_err());
    }
}
