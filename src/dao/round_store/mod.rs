//! Round store abstraction and its backends.

/// In-process store used by default and in tests.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameMode, LeaderboardEntity, PostEntity, RoundEntity, UserEntity, VoteEntity, VoteType,
};
use crate::dao::storage::StorageResult;

pub use self::memory::MemoryRoundStore;

/// Abstraction over the persistence layer for rounds and everything attached to them.
///
/// Inserts are guarded by uniqueness constraints and report lost races as
/// [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict):
/// round id and `(game_mode, round_number)`, post `(round_id, author_id)`,
/// vote `(post_id, user_id)`, leaderboard `post_id` and user `wallet_address`.
pub trait RoundStore: Send + Sync {
    /// Rows of `mode` still flagged active, newest first.
    fn active_rounds(&self, mode: GameMode) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Every round, newest first.
    fn list_rounds(&self) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Round with identifier `id`.
    fn find_round(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    /// Highest round number ever issued for `mode`, active or not.
    fn latest_round_number(&self, mode: GameMode)
    -> BoxFuture<'static, StorageResult<Option<u64>>>;
    /// Insert a new round.
    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Flag a round inactive and server-ended. Ending an ended round is a no-op.
    fn end_round(&self, id: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Record `winner_id` as the winner of round `id`.
    fn set_round_winner(
        &self,
        id: String,
        winner_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// User with identifier `id`.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// User registered with `wallet_address`.
    fn find_user_by_wallet(
        &self,
        wallet_address: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Register a new user.
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Store a new post.
    fn insert_post(&self, post: PostEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Post with identifier `id`.
    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PostEntity>>>;
    /// Posts of a round, oldest first.
    fn posts_for_round(
        &self,
        round_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>>;
    /// Post written by `author_id` in `round_id`.
    fn find_post_by_author(
        &self,
        round_id: String,
        author_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PostEntity>>>;

    /// Store a new vote.
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Vote cast by `user_id` on `post_id`.
    fn find_vote(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<VoteEntity>>>;
    /// Atomically bump the counter matching `vote_type` on a post.
    fn increment_post_votes(
        &self,
        post_id: Uuid,
        vote_type: VoteType,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Record a round winner.
    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Leaderboard ordered by amount, then most recent first.
    fn list_leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>>;

    /// Cheap probe of the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
