use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    GameMode, LeaderboardEntity, PostEntity, RoundEntity, UserEntity, VoteEntity, VoteType,
};

pub const ROUNDS: &str = "rounds";
pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const VOTES: &str = "votes";
pub const LEADERBOARD: &str = "leaderboard";

fn parse_uuid(collection: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        collection,
        reason: format!("invalid uuid `{raw}`: {err}"),
    })
}

fn counter(collection: &'static str, raw: i64) -> MongoResult<u64> {
    u64::try_from(raw).map_err(|_| MongoDaoError::Malformed {
        collection,
        reason: format!("negative counter {raw}"),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_mode: GameMode,
    pub round_number: i64,
    pub start_time: DateTime,
    pub end_time: DateTime,
    pub is_active: bool,
    #[serde(default)]
    pub server_ended: bool,
    #[serde(default)]
    pub winner_id: Option<String>,
    pub created_at: DateTime,
}

impl From<RoundEntity> for MongoRoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id,
            game_mode: value.game_mode,
            round_number: value.round_number as i64,
            start_time: DateTime::from_system_time(value.start_time),
            end_time: DateTime::from_system_time(value.end_time),
            is_active: value.is_active,
            server_ended: value.server_ended,
            winner_id: value.winner_id.map(|id| id.to_string()),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoRoundDocument> for RoundEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoundDocument) -> MongoResult<Self> {
        Ok(Self {
            round_number: counter(ROUNDS, value.round_number)?,
            winner_id: value
                .winner_id
                .as_deref()
                .map(|raw| parse_uuid(ROUNDS, raw))
                .transpose()?,
            id: value.id,
            game_mode: value.game_mode,
            start_time: value.start_time.to_system_time(),
            end_time: value.end_time.to_system_time(),
            is_active: value.is_active,
            server_ended: value.server_ended,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub wallet_address: String,
    pub created_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id.to_string(),
            wallet_address: value.wallet_address,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoUserDocument> for UserEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoUserDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid(USERS, &value.id)?,
            wallet_address: value.wallet_address,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPostDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub round_id: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    pub created_at: DateTime,
}

impl From<PostEntity> for MongoPostDocument {
    fn from(value: PostEntity) -> Self {
        Self {
            id: value.id.to_string(),
            content: value.content,
            author_id: value.author_id.to_string(),
            round_id: value.round_id,
            upvotes: value.upvotes as i64,
            downvotes: value.downvotes as i64,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPostDocument> for PostEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPostDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid(POSTS, &value.id)?,
            content: value.content,
            author_id: parse_uuid(POSTS, &value.author_id)?,
            round_id: value.round_id,
            upvotes: counter(POSTS, value.upvotes)?,
            downvotes: counter(POSTS, value.downvotes)?,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
    pub created_at: DateTime,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: value.id.to_string(),
            post_id: value.post_id.to_string(),
            user_id: value.user_id.to_string(),
            vote_type: value.vote_type,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoVoteDocument> for VoteEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoVoteDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid(VOTES, &value.id)?,
            post_id: parse_uuid(VOTES, &value.post_id)?,
            user_id: parse_uuid(VOTES, &value.user_id)?,
            vote_type: value.vote_type,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLeaderboardDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub winner_id: String,
    pub post_id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub transaction_hash: String,
    pub created_at: DateTime,
}

impl From<LeaderboardEntity> for MongoLeaderboardDocument {
    fn from(value: LeaderboardEntity) -> Self {
        Self {
            id: value.id.to_string(),
            winner_id: value.winner_id.to_string(),
            post_id: value.post_id.to_string(),
            amount: value.amount as i64,
            transaction_hash: value.transaction_hash,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoLeaderboardDocument> for LeaderboardEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoLeaderboardDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_uuid(LEADERBOARD, &value.id)?,
            winner_id: parse_uuid(LEADERBOARD, &value.winner_id)?,
            post_id: parse_uuid(LEADERBOARD, &value.post_id)?,
            amount: counter(LEADERBOARD, value.amount)?,
            transaction_hash: value.transaction_hash,
            created_at: value.created_at.to_system_time(),
        })
    }
}
