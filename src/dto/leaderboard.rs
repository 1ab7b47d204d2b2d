//! Leaderboard payloads.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{LeaderboardEntity, PostEntity, UserEntity},
    dto::format_system_time,
};

/// Recorded round winner, joined with its author and post when still present.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardItem {
    /// Leaderboard entry identifier.
    pub id: Uuid,
    /// Author of the winning post.
    pub winner_id: Uuid,
    /// Wallet of the winner, when the user still exists.
    pub wallet_address: Option<String>,
    /// Winning post.
    pub post_id: Uuid,
    /// Text of the winning post.
    pub content: Option<String>,
    /// Round the post won.
    pub round_id: Option<String>,
    /// Final net score of the post.
    pub net_score: Option<i64>,
    /// Payout amount, zero until paid.
    pub amount: u64,
    /// Payout transaction, empty until paid.
    pub transaction_hash: String,
    /// RFC 3339 time the winner was recorded.
    pub created_at: String,
}

impl LeaderboardItem {
    /// Join `entry` with its winner and post, when they can still be found.
    pub fn new(
        entry: &LeaderboardEntity,
        winner: Option<&UserEntity>,
        post: Option<&PostEntity>,
    ) -> Self {
        Self {
            id: entry.id,
            winner_id: entry.winner_id,
            wallet_address: winner.map(|user| user.wallet_address.clone()),
            post_id: entry.post_id,
            content: post.map(|post| post.content.clone()),
            round_id: post.map(|post| post.round_id.clone()),
            net_score: post.map(PostEntity::net_score),
            amount: entry.amount,
            transaction_hash: entry.transaction_hash.clone(),
            created_at: format_system_time(entry.created_at),
        }
    }
}

/// Full leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Entries, highest payout then most recent first.
    pub entries: Vec<LeaderboardItem>,
}
