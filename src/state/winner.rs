//! Winner selection and idempotent persistence of the result.

use std::{cmp::Reverse, time::SystemTime};

use tracing::{debug, info};

use crate::dao::{
    models::{LeaderboardEntity, PostEntity},
    round_store::RoundStore,
    storage::StorageResult,
};

/// Post that won (or is winning) a round, with its net score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinningPost {
    /// The post itself.
    pub post: PostEntity,
    /// Net score at the time of reading.
    pub net_score: i64,
}

impl From<PostEntity> for WinningPost {
    fn from(post: PostEntity) -> Self {
        Self {
            net_score: post.net_score(),
            post,
        }
    }
}

/// Highest net score wins; ties go to the earliest post, then the smallest id.
///
/// Deterministic for a given set of posts, whatever order they are listed in.
pub fn select_winner(posts: &[PostEntity]) -> Option<&PostEntity> {
    posts
        .iter()
        .min_by_key(|post| (Reverse(post.net_score()), post.created_at, post.id))
}

/// Read path: the post written as winner of `round_id`, if any.
///
/// Follows the round's stored `winner_id` to that author's post in the
/// round, so every reader sees what was persisted rather than a fresh
/// computation.
pub async fn winner_for_round(
    store: &dyn RoundStore,
    round_id: &str,
) -> StorageResult<Option<WinningPost>> {
    let Some(winner_id) = store
        .find_round(round_id.to_owned())
        .await?
        .and_then(|round| round.winner_id)
    else {
        return Ok(None);
    };

    let post = store
        .find_post_by_author(round_id.to_owned(), winner_id)
        .await?;
    Ok(post.map(WinningPost::from))
}

/// Select the winner of `round_id` and persist it.
///
/// Sets the round's `winner_id`, then records a leaderboard entry. The two
/// writes are not atomic. A leaderboard conflict means another actor already
/// recorded this winner and counts as success, so concurrent callers converge
/// on a single entry.
pub async fn resolve(
    store: &dyn RoundStore,
    round_id: &str,
    now: SystemTime,
) -> StorageResult<Option<WinningPost>> {
    let posts = store.posts_for_round(round_id.to_owned()).await?;
    let Some(winner) = select_winner(&posts).cloned() else {
        debug!(round_id, "round closed without posts; no winner");
        return Ok(None);
    };

    store
        .set_round_winner(round_id.to_owned(), winner.author_id)
        .await?;

    let entry = LeaderboardEntity::unpaid(winner.author_id, winner.id, now);
    match store.insert_leaderboard_entry(entry).await {
        Ok(()) => info!(
            round_id,
            post_id = %winner.id,
            author_id = %winner.author_id,
            net_score = winner.net_score(),
            "round winner recorded"
        ),
        Err(err) if err.is_conflict() => {
            debug!(round_id, post_id = %winner.id, "winner already recorded elsewhere")
        }
        Err(err) => return Err(err),
    }

    Ok(Some(WinningPost::from(winner)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        models::{GameMode, RoundEntity},
        round_store::MemoryRoundStore,
    };

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn post(round_id: &str, up: u64, down: u64, created: u64) -> PostEntity {
        let mut post = PostEntity::new("content", Uuid::new_v4(), round_id, at(created));
        post.upvotes = up;
        post.downvotes = down;
        post
    }

    #[test]
    fn highest_net_score_wins() {
        let posts = vec![
            post("r", 5, 1, 10),
            post("r", 7, 2, 20),
            post("r", 3, 0, 5),
        ];

        let winner = select_winner(&posts).unwrap();
        assert_eq!(winner.id, posts[1].id);
    }

    #[test]
    fn ties_go_to_the_earliest_post() {
        let posts = vec![post("r", 4, 0, 20), post("r", 4, 0, 10)];
        assert_eq!(select_winner(&posts).unwrap().id, posts[1].id);
    }

    #[test]
    fn selection_ignores_listing_order() {
        let mut posts = vec![
            post("r", 2, 0, 10),
            post("r", 2, 0, 10),
            post("r", 1, 0, 1),
        ];
        let first = select_winner(&posts).unwrap().id;
        posts.reverse();
        assert_eq!(select_winner(&posts).unwrap().id, first);
        let tied_min = posts
            .iter()
            .filter(|p| p.upvotes == 2)
            .map(|p| p.id)
            .min()
            .unwrap();
        assert_eq!(first, tied_min);
    }

    #[test]
    fn no_posts_means_no_winner() {
        assert!(select_winner(&[]).is_none());
    }

    #[tokio::test]
    async fn resolve_sets_winner_and_leaderboard() {
        let store = MemoryRoundStore::new();
        let round = RoundEntity::open(GameMode::Short, 1, at(0));
        store.insert_round(round.clone()).await.unwrap();
        let loser = post(&round.id, 1, 0, 1);
        let winner = post(&round.id, 3, 1, 2);
        store.insert_post(loser).await.unwrap();
        store.insert_post(winner.clone()).await.unwrap();

        let resolved = resolve(&store, &round.id, at(61)).await.unwrap().unwrap();
        assert_eq!(resolved.post.id, winner.id);
        assert_eq!(resolved.net_score, 2);

        let stored = store.find_round(round.id.clone()).await.unwrap().unwrap();
        assert_eq!(stored.winner_id, Some(winner.author_id));
        let board = store.list_leaderboard().await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].post_id, winner.id);
    }

    #[tokio::test]
    async fn concurrent_resolution_records_a_single_entry() {
        let store = MemoryRoundStore::new();
        let round = RoundEntity::open(GameMode::Short, 1, at(0));
        store.insert_round(round.clone()).await.unwrap();
        store.insert_post(post(&round.id, 2, 0, 1)).await.unwrap();

        let (a, b, c) = tokio::join!(
            resolve(&store, &round.id, at(61)),
            resolve(&store, &round.id, at(61)),
            resolve(&store, &round.id, at(62)),
        );

        let ids: Vec<_> = [a, b, c]
            .into_iter()
            .map(|result| result.unwrap().unwrap().post.id)
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(store.list_leaderboard().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_path_follows_the_stored_winner() {
        let store = MemoryRoundStore::new();
        let round = RoundEntity::open(GameMode::Short, 1, at(0));
        store.insert_round(round.clone()).await.unwrap();
        let early = post(&round.id, 1, 0, 1);
        store.insert_post(early.clone()).await.unwrap();

        assert!(winner_for_round(&store, &round.id).await.unwrap().is_none());

        resolve(&store, &round.id, at(61)).await.unwrap();
        // A later post outscoring the recorded one does not change what readers see.
        store.insert_post(post(&round.id, 9, 0, 2)).await.unwrap();

        let read = winner_for_round(&store, &round.id).await.unwrap().unwrap();
        assert_eq!(read.post.id, early.id);
    }

    #[tokio::test]
    async fn empty_round_resolves_to_none() {
        let store = MemoryRoundStore::new();
        let round = RoundEntity::open(GameMode::Medium, 1, at(0));
        store.insert_round(round.clone()).await.unwrap();

        assert!(resolve(&store, &round.id, at(5_000)).await.unwrap().is_none());
        assert!(store.list_leaderboard().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let store = MemoryRoundStore::new();
        store.set_offline(true);
        assert!(resolve(&store, "short_round-1", at(0)).await.is_err());
    }
}
