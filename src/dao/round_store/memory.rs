use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RoundStore;
use crate::dao::{
    models::{
        GameMode, LeaderboardEntity, PostEntity, RoundEntity, UserEntity, VoteEntity, VoteType,
    },
    storage::{StorageError, StorageResult},
};

/// Process-local store used when no database is configured.
///
/// Uniqueness constraints are checked under the table write lock, so concurrent
/// writers observe the same conflicts a database index would raise.
#[derive(Clone)]
pub struct MemoryRoundStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

#[derive(Default)]
struct Tables {
    rounds: HashMap<String, RoundEntity>,
    users: HashMap<Uuid, UserEntity>,
    posts: HashMap<Uuid, PostEntity>,
    votes: Vec<VoteEntity>,
    leaderboard: Vec<LeaderboardEntity>,
}

impl MemoryInner {
    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store offline"),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryRoundStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRoundStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(Tables::default()),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Release);
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> StorageResult<T> {
        self.inner.ensure_online()?;
        let tables = self.inner.tables.read().await;
        Ok(f(&tables))
    }

    async fn write<T>(&self, f: impl FnOnce(&mut Tables) -> StorageResult<T>) -> StorageResult<T> {
        self.inner.ensure_online()?;
        let mut tables = self.inner.tables.write().await;
        f(&mut tables)
    }
}

fn newest_first(rounds: &mut [RoundEntity]) {
    rounds.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.round_number.cmp(&a.round_number))
    });
}

impl RoundStore for MemoryRoundStore {
    fn active_rounds(&self, mode: GameMode) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    let mut rounds: Vec<_> = tables
                        .rounds
                        .values()
                        .filter(|round| round.game_mode == mode && round.is_active)
                        .cloned()
                        .collect();
                    newest_first(&mut rounds);
                    rounds
                })
                .await
        })
    }

    fn list_rounds(&self) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    let mut rounds: Vec<_> = tables.rounds.values().cloned().collect();
                    newest_first(&mut rounds);
                    rounds
                })
                .await
        })
    }

    fn find_round(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read(|tables| tables.rounds.get(&id).cloned()).await })
    }

    fn latest_round_number(
        &self,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    tables
                        .rounds
                        .values()
                        .filter(|round| round.game_mode == mode)
                        .map(|round| round.round_number)
                        .max()
                })
                .await
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    let taken = tables.rounds.contains_key(&round.id)
                        || tables.rounds.values().any(|existing| {
                            existing.game_mode == round.game_mode
                                && existing.round_number == round.round_number
                        });
                    if taken {
                        return Err(StorageError::conflict("round", round.id));
                    }
                    tables.rounds.insert(round.id.clone(), round);
                    Ok(())
                })
                .await
        })
    }

    fn end_round(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if let Some(round) = tables.rounds.get_mut(&id) {
                        round.is_active = false;
                        round.server_ended = true;
                    }
                    Ok(())
                })
                .await
        })
    }

    fn set_round_winner(
        &self,
        id: String,
        winner_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if let Some(round) = tables.rounds.get_mut(&id) {
                        round.winner_id = Some(winner_id);
                    }
                    Ok(())
                })
                .await
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read(|tables| tables.users.get(&id).cloned()).await })
    }

    fn find_user_by_wallet(
        &self,
        wallet_address: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    tables
                        .users
                        .values()
                        .find(|user| user.wallet_address == wallet_address)
                        .cloned()
                })
                .await
        })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if tables
                        .users
                        .values()
                        .any(|existing| existing.wallet_address == user.wallet_address)
                    {
                        return Err(StorageError::conflict("user", user.wallet_address));
                    }
                    tables.users.insert(user.id, user);
                    Ok(())
                })
                .await
        })
    }

    fn insert_post(&self, post: PostEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if tables.posts.values().any(|existing| {
                        existing.round_id == post.round_id && existing.author_id == post.author_id
                    }) {
                        return Err(StorageError::conflict(
                            "post",
                            format!("{}/{}", post.round_id, post.author_id),
                        ));
                    }
                    tables.posts.insert(post.id, post);
                    Ok(())
                })
                .await
        })
    }

    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read(|tables| tables.posts.get(&id).cloned()).await })
    }

    fn posts_for_round(
        &self,
        round_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    let mut posts: Vec<_> = tables
                        .posts
                        .values()
                        .filter(|post| post.round_id == round_id)
                        .cloned()
                        .collect();
                    posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                    posts
                })
                .await
        })
    }

    fn find_post_by_author(
        &self,
        round_id: String,
        author_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    tables
                        .posts
                        .values()
                        .find(|post| post.round_id == round_id && post.author_id == author_id)
                        .cloned()
                })
                .await
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if tables.votes.iter().any(|existing| {
                        existing.post_id == vote.post_id && existing.user_id == vote.user_id
                    }) {
                        return Err(StorageError::conflict(
                            "vote",
                            format!("{}/{}", vote.post_id, vote.user_id),
                        ));
                    }
                    tables.votes.push(vote);
                    Ok(())
                })
                .await
        })
    }

    fn find_vote(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    tables
                        .votes
                        .iter()
                        .find(|vote| vote.post_id == post_id && vote.user_id == user_id)
                        .cloned()
                })
                .await
        })
    }

    fn increment_post_votes(
        &self,
        post_id: Uuid,
        vote_type: VoteType,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if let Some(post) = tables.posts.get_mut(&post_id) {
                        match vote_type {
                            VoteType::Upvote => post.upvotes += 1,
                            VoteType::Downvote => post.downvotes += 1,
                        }
                    }
                    Ok(())
                })
                .await
        })
    }

    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write(|tables| {
                    if tables
                        .leaderboard
                        .iter()
                        .any(|existing| existing.post_id == entry.post_id)
                    {
                        return Err(StorageError::conflict(
                            "leaderboard entry",
                            entry.post_id.to_string(),
                        ));
                    }
                    tables.leaderboard.push(entry);
                    Ok(())
                })
                .await
        })
    }

    fn list_leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .read(|tables| {
                    let mut entries = tables.leaderboard.clone();
                    entries.sort_by(|a, b| {
                        b.amount
                            .cmp(&a.amount)
                            .then(b.created_at.cmp(&a.created_at))
                    });
                    entries
                })
                .await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online() })
    }
}
