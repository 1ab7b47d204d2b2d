use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        LEADERBOARD, MongoLeaderboardDocument, MongoPostDocument, MongoRoundDocument,
        MongoUserDocument, MongoVoteDocument, POSTS, ROUNDS, USERS, VOTES,
    },
};
use crate::dao::{
    models::{
        GameMode, LeaderboardEntity, PostEntity, RoundEntity, UserEntity, VoteEntity, VoteType,
    },
    round_store::RoundStore,
    storage::{StorageError, StorageResult},
};

/// Round store persisted in MongoDB collections, with unique indexes
/// enforcing the store's uniqueness rules.
#[derive(Clone)]
pub struct MongoRoundStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoundStore {
    /// Establish a connection to MongoDB and ensure the uniqueness indexes exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        self.ensure_index(
            ROUNDS,
            "round_mode_number_idx",
            doc! {"game_mode": 1, "round_number": 1},
            true,
        )
        .await?;
        self.ensure_index(
            ROUNDS,
            "round_mode_active_idx",
            doc! {"game_mode": 1, "is_active": 1},
            false,
        )
        .await?;
        self.ensure_index(USERS, "user_wallet_idx", doc! {"wallet_address": 1}, true)
            .await?;
        self.ensure_index(
            POSTS,
            "post_round_author_idx",
            doc! {"round_id": 1, "author_id": 1},
            true,
        )
        .await?;
        self.ensure_index(VOTES, "vote_post_user_idx", doc! {"post_id": 1, "user_id": 1}, true)
            .await?;
        self.ensure_index(LEADERBOARD, "leaderboard_post_idx", doc! {"post_id": 1}, true)
            .await?;
        Ok(())
    }

    async fn ensure_index(
        &self,
        collection: &'static str,
        index: &'static str,
        keys: Document,
        unique: bool,
    ) -> MongoResult<()> {
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(Some(index.to_owned()))
                    .unique(Some(unique))
                    .build(),
            )
            .build();

        self.collection::<Document>(collection)
            .await
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection,
                index,
                source,
            })?;
        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_many<D, E>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Document,
    ) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Unpin + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = self
            .collection::<D>(collection)
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?;

        documents.into_iter().map(E::try_from).collect()
    }

    async fn find_first<D, E>(
        &self,
        collection: &'static str,
        filter: Document,
    ) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Unpin + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        self.collection::<D>(collection)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?
            .map(E::try_from)
            .transpose()
    }

    async fn insert<D>(
        &self,
        collection: &'static str,
        entity: &'static str,
        key: String,
        document: D,
    ) -> StorageResult<()>
    where
        D: Serialize + Send + Sync,
    {
        match self
            .collection::<D>(collection)
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::conflict(entity, key)),
            Err(source) => Err(MongoDaoError::Write { collection, source }.into()),
        }
    }

    async fn update(
        &self,
        collection: &'static str,
        filter: Document,
        update: Document,
    ) -> MongoResult<()> {
        self.collection::<Document>(collection)
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(())
    }

    async fn latest_round_number(&self, mode: GameMode) -> MongoResult<Option<u64>> {
        let latest: Option<RoundEntity> = self
            .collection::<MongoRoundDocument>(ROUNDS)
            .await
            .find_one(doc! {"game_mode": mode.as_str()})
            .sort(doc! {"round_number": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROUNDS,
                source,
            })?
            .map(RoundEntity::try_from)
            .transpose()?;

        Ok(latest.map(|round| round.round_number))
    }
}

impl RoundStore for MongoRoundStore {
    fn active_rounds(&self, mode: GameMode) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoRoundDocument, RoundEntity>(
                    ROUNDS,
                    doc! {"game_mode": mode.as_str(), "is_active": true},
                    doc! {"created_at": -1, "round_number": -1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn list_rounds(&self) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoRoundDocument, RoundEntity>(
                    ROUNDS,
                    doc! {},
                    doc! {"created_at": -1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_round(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_first::<MongoRoundDocument, RoundEntity>(ROUNDS, doc! {"_id": id})
                .await
                .map_err(Into::into)
        })
    }

    fn latest_round_number(
        &self,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_round_number(mode).await.map_err(Into::into) })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = round.id.clone();
            store
                .insert(ROUNDS, "round", key, MongoRoundDocument::from(round))
                .await
        })
    }

    fn end_round(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(
                    ROUNDS,
                    doc! {"_id": id},
                    doc! {"$set": {"is_active": false, "server_ended": true}},
                )
                .await
                .map_err(Into::into)
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
                .update(
                    ROUNDS,
                    doc! {"_id": id},
                    doc! {"$set": {"winner_id": winner_id.to_string()}},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_first::<MongoUserDocument, UserEntity>(USERS, doc! {"_id": id.to_string()})
                .await
                .map_err(Into::into)
        })
    }

    fn find_user_by_wallet(
        &self,
        wallet_address: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_first::<MongoUserDocument, UserEntity>(
                    USERS,
                    doc! {"wallet_address": wallet_address},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = user.wallet_address.clone();
            store
                .insert(USERS, "user", key, MongoUserDocument::from(user))
                .await
        })
    }

    fn insert_post(&self, post: PostEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = format!("{}/{}", post.round_id, post.author_id);
            store
                .insert(POSTS, "post", key, MongoPostDocument::from(post))
                .await
        })
    }

    fn find_post(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_first::<MongoPostDocument, PostEntity>(POSTS, doc! {"_id": id.to_string()})
                .await
                .map_err(Into::into)
        })
    }

    fn posts_for_round(
        &self,
        round_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoPostDocument, PostEntity>(
                    POSTS,
                    doc! {"round_id": round_id},
                    doc! {"created_at": 1, "_id": 1},
                )
                .await
                .map_err(Into::into)
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
                .find_first::<MongoPostDocument, PostEntity>(
                    POSTS,
                    doc! {"round_id": round_id, "author_id": author_id.to_string()},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = format!("{}/{}", vote.post_id, vote.user_id);
            store
                .insert(VOTES, "vote", key, MongoVoteDocument::from(vote))
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
                .find_first::<MongoVoteDocument, VoteEntity>(
                    VOTES,
                    doc! {"post_id": post_id.to_string(), "user_id": user_id.to_string()},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn increment_post_votes(
        &self,
        post_id: Uuid,
        vote_type: VoteType,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut counter = Document::new();
            counter.insert(vote_type.counter_field(), 1_i64);
            store
                .update(POSTS, doc! {"_id": post_id.to_string()}, doc! {"$inc": counter})
                .await
                .map_err(Into::into)
        })
    }

    fn insert_leaderboard_entry(
        &self,
        entry: LeaderboardEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = entry.post_id.to_string();
            store
                .insert(
                    LEADERBOARD,
                    "leaderboard entry",
                    key,
                    MongoLeaderboardDocument::from(entry),
                )
                .await
        })
    }

    fn list_leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many::<MongoLeaderboardDocument, LeaderboardEntity>(
                    LEADERBOARD,
                    doc! {},
                    doc! {"amount": -1, "created_at": -1},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
