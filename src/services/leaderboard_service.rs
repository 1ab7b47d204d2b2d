use crate::{
    dto::leaderboard::{LeaderboardItem, LeaderboardResponse},
    error::ServiceError,
    state::SharedState,
};

/// Recorded winners, highest payout then newest first, joined with their
/// wallet and post.
pub async fn leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_round_store().await?;
    let entries = store.list_leaderboard().await?;

    let mut items = Vec::with_capacity(entries.len());
    for entry in &entries {
        let winner = store.find_user(entry.winner_id).await?;
        let post = store.find_post(entry.post_id).await?;
        items.push(LeaderboardItem::new(entry, winner.as_ref(), post.as_ref()));
    }

    Ok(LeaderboardResponse { entries: items })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{GameMode, LeaderboardEntity, PostEntity, RoundEntity, UserEntity},
            round_store::{MemoryRoundStore, RoundStore},
        },
        state::AppState,
    };

    #[tokio::test]
    async fn entries_are_joined_with_wallet_and_post() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;

        let now = SystemTime::now();
        let round = RoundEntity::open(GameMode::Short, 1, now);
        let user = UserEntity::new("0xabc", now);
        let post = PostEntity::new("gm", user.id, &round.id, now);
        store.insert_user(user.clone()).await.unwrap();
        store.insert_post(post.clone()).await.unwrap();
        store
            .insert_leaderboard_entry(LeaderboardEntity::unpaid(user.id, post.id, now))
            .await
            .unwrap();

        let board = leaderboard(&state).await.unwrap();
        assert_eq!(board.entries.len(), 1);
        let item = &board.entries[0];
        assert_eq!(item.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(item.content.as_deref(), Some("gm"));
        assert_eq!(item.round_id.as_deref(), Some(round.id.as_str()));
    }

    #[tokio::test]
    async fn missing_joins_leave_fields_empty() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoundStore::new();
        state.install_round_store(Arc::new(store.clone())).await;
        let orphan = LeaderboardEntity::unpaid(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            SystemTime::now(),
        );
        store.insert_leaderboard_entry(orphan).await.unwrap();

        let board = leaderboard(&state).await.unwrap();
        assert!(board.entries[0].wallet_address.is_none());
        assert!(board.entries[0].content.is_none());
    }
}
