//! Entities shared by every storage backend.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::phase::{RoundPhase, classify};

/// Round cadence. Each mode runs its own independent sequence of rounds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// One-minute rounds.
    Short,
    /// Thirty-minute rounds.
    Medium,
    /// Three-hour rounds.
    Long,
}

impl GameMode {
    /// Every mode, in scheduling order.
    pub const ALL: [GameMode; 3] = [GameMode::Short, GameMode::Medium, GameMode::Long];

    /// Length of the ACTIVE phase of a round in this mode.
    pub fn duration(self) -> Duration {
        match self {
            GameMode::Short => Duration::from_secs(60),
            GameMode::Medium => Duration::from_secs(30 * 60),
            GameMode::Long => Duration::from_secs(3 * 60 * 60),
        }
    }

    /// Prefix used when deriving round identifiers.
    pub fn id_prefix(self) -> &'static str {
        match self {
            GameMode::Short => "short_round",
            GameMode::Medium => "medium_round",
            GameMode::Long => "long_round",
        }
    }

    /// Wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Short => "short",
            GameMode::Medium => "medium",
            GameMode::Long => "long",
        }
    }

    /// Deterministic id for the `round_number`-th round of this mode.
    pub fn round_id(self, round_number: u64) -> String {
        format!("{}-{}", self.id_prefix(), round_number)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted voting round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEntity {
    /// Deterministic identifier, `{mode prefix}-{round_number}`.
    pub id: String,
    /// Cadence this round belongs to.
    pub game_mode: GameMode,
    /// Position in the sequence of its mode, starting at 1.
    pub round_number: u64,
    /// Moment the round opened.
    pub start_time: SystemTime,
    /// Deadline for posts and votes.
    pub end_time: SystemTime,
    /// Cleared once the round is retired.
    pub is_active: bool,
    /// Set by the controller that retired the round.
    pub server_ended: bool,
    /// Author of the winning post, once resolved.
    pub winner_id: Option<Uuid>,
    /// Insertion time of the row.
    pub created_at: SystemTime,
}

impl RoundEntity {
    /// Build a fresh, active round starting at `now`.
    pub fn open(game_mode: GameMode, round_number: u64, now: SystemTime) -> Self {
        Self {
            id: game_mode.round_id(round_number),
            game_mode,
            round_number,
            start_time: now,
            end_time: now + game_mode.duration(),
            is_active: true,
            server_ended: false,
            winner_id: None,
            created_at: now,
        }
    }

    /// Phase of this round at `now` given the preparation window length.
    pub fn phase_at(&self, now: SystemTime, preparation: Duration) -> RoundPhase {
        classify(now, self.end_time, preparation)
    }

    /// Instant at which the preparation window closes.
    pub fn preparation_ends_at(&self, preparation: Duration) -> SystemTime {
        self.end_time + preparation
    }

    /// Whether the row is still flagged live in storage.
    pub fn is_live(&self) -> bool {
        self.is_active && !self.server_ended
    }
}

/// Participant identified by a wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Wallet the user signs in with. Unique.
    pub wallet_address: String,
    /// First time the wallet was seen.
    pub created_at: SystemTime,
}

impl UserEntity {
    /// Create a user for `wallet_address`.
    pub fn new(wallet_address: impl Into<String>, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_address: wallet_address.into(),
            created_at: now,
        }
    }
}

/// Submission competing within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEntity {
    /// Stable identifier for the post.
    pub id: Uuid,
    /// Trimmed post text.
    pub content: String,
    /// User who wrote the post.
    pub author_id: Uuid,
    /// Round the post competes in.
    pub round_id: String,
    /// Number of upvotes received.
    pub upvotes: u64,
    /// Number of downvotes received.
    pub downvotes: u64,
    /// Submission time, used to break score ties.
    pub created_at: SystemTime,
}

impl PostEntity {
    /// Create a post with zeroed counters.
    pub fn new(
        content: impl Into<String>,
        author_id: Uuid,
        round_id: impl Into<String>,
        now: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            author_id,
            round_id: round_id.into(),
            upvotes: 0,
            downvotes: 0,
            created_at: now,
        }
    }

    /// Upvotes minus downvotes.
    pub fn net_score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    /// Adds one to the net score.
    Upvote,
    /// Removes one from the net score.
    Downvote,
}

impl VoteType {
    /// Name of the post counter this vote increments.
    pub fn counter_field(self) -> &'static str {
        match self {
            VoteType::Upvote => "upvotes",
            VoteType::Downvote => "downvotes",
        }
    }
}

/// A single user's vote on a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEntity {
    /// Stable identifier for the vote.
    pub id: Uuid,
    /// Post being voted on.
    pub post_id: Uuid,
    /// User casting the vote.
    pub user_id: Uuid,
    /// Direction of the vote.
    pub vote_type: VoteType,
    /// Time the vote was cast.
    pub created_at: SystemTime,
}

impl VoteEntity {
    /// Record a new vote.
    pub fn new(post_id: Uuid, user_id: Uuid, vote_type: VoteType, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            vote_type,
            created_at: now,
        }
    }
}

/// Record of a round winner. At most one entry exists per post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntity {
    /// Stable identifier for the entry.
    pub id: Uuid,
    /// Author of the winning post.
    pub winner_id: Uuid,
    /// Winning post. Unique across the leaderboard.
    pub post_id: Uuid,
    /// Payout amount, zero until paid.
    pub amount: u64,
    /// Payout transaction, empty until paid.
    pub transaction_hash: String,
    /// Time the winner was recorded.
    pub created_at: SystemTime,
}

impl LeaderboardEntity {
    /// Entry for a freshly resolved winner. Payout fields stay empty until settled elsewhere.
    pub fn unpaid(winner_id: Uuid, post_id: Uuid, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            winner_id,
            post_id,
            amount: 0,
            transaction_hash: String::new(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_ids_are_derived_from_mode_and_number() {
        assert_eq!(GameMode::Short.round_id(1), "short_round-1");
        assert_eq!(GameMode::Medium.round_id(12), "medium_round-12");
        assert_eq!(GameMode::Long.round_id(3), "long_round-3");
    }

    #[test]
    fn open_round_ends_after_mode_duration() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let round = RoundEntity::open(GameMode::Short, 4, now);

        assert_eq!(round.id, "short_round-4");
        assert_eq!(round.end_time, now + Duration::from_secs(60));
        assert!(round.is_live());
        assert!(round.winner_id.is_none());
    }

    #[test]
    fn net_score_can_be_negative() {
        let mut post = PostEntity::new("hi", Uuid::new_v4(), "short_round-1", SystemTime::now());
        post.upvotes = 2;
        post.downvotes = 5;
        assert_eq!(post.net_score(), -3);
    }
}
