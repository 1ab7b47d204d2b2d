//! Round payloads for public reads and admin operations.

use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dao::models::{GameMode, RoundEntity},
    dto::{format_system_time, phase::VisibleRoundPhase, signed_millis},
    metrics::OperationSummary,
    state::{lifecycle::RoundStatus, phase::RoundPhase, winner::WinningPost},
};

/// Query selecting the round sequence to operate on.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoundQuery {
    /// Round cadence (`short`, `medium` or `long`).
    pub mode: GameMode,
}

/// Stored round as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundSummary {
    /// Round identifier.
    pub id: String,
    /// Cadence of the round.
    pub game_mode: GameMode,
    /// Position in the sequence of its mode.
    pub round_number: u64,
    /// RFC 3339 opening time.
    pub start_time: String,
    /// RFC 3339 deadline for posts and votes.
    pub end_time: String,
    /// Whether the round is still flagged live.
    pub is_active: bool,
    /// Whether a controller retired the round.
    pub server_ended: bool,
    /// Author of the winning post, once resolved.
    pub winner_id: Option<Uuid>,
    /// RFC 3339 insertion time.
    pub created_at: String,
}

impl From<&RoundEntity> for RoundSummary {
    fn from(value: &RoundEntity) -> Self {
        Self {
            id: value.id.clone(),
            game_mode: value.game_mode,
            round_number: value.round_number,
            start_time: format_system_time(value.start_time),
            end_time: format_system_time(value.end_time),
            is_active: value.is_active,
            server_ended: value.server_ended,
            winner_id: value.winner_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Winning post of a round.
#[derive(Debug, Serialize, ToSchema)]
pub struct WinnerSummary {
    /// Winning post.
    pub post_id: Uuid,
    /// Author of the winning post.
    pub author_id: Uuid,
    /// Text of the winning post.
    pub content: String,
    /// Upvotes received.
    pub upvotes: u64,
    /// Downvotes received.
    pub downvotes: u64,
    /// Upvotes minus downvotes.
    pub net_score: i64,
    /// RFC 3339 submission time.
    pub created_at: String,
}

impl From<&WinningPost> for WinnerSummary {
    fn from(value: &WinningPost) -> Self {
        Self {
            post_id: value.post.id,
            author_id: value.post.author_id,
            content: value.post.content.clone(),
            upvotes: value.post.upvotes,
            downvotes: value.post.downvotes,
            net_score: value.net_score,
            created_at: format_system_time(value.post.created_at),
        }
    }
}

/// Current round of a mode after the lifecycle has been evaluated.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundStatusResponse {
    /// Current round.
    pub round: RoundSummary,
    /// Phase of the round at `server_time`.
    pub phase: VisibleRoundPhase,
    /// RFC 3339 end of the preparation window.
    pub preparation_ends_at: String,
    /// Milliseconds until the current phase ends.
    pub phase_remaining_ms: u64,
    /// RFC 3339 server clock.
    pub server_time: String,
    /// Recorded winner, once the round left the active phase.
    pub winner: Option<WinnerSummary>,
}

impl RoundStatusResponse {
    /// Render `status` as observed at `now`.
    pub fn new(status: &RoundStatus, now: SystemTime) -> Self {
        let phase_end = match status.phase {
            RoundPhase::Active => status.round.end_time,
            RoundPhase::Preparation | RoundPhase::Ended => status.preparation_ends_at,
        };
        Self {
            round: RoundSummary::from(&status.round),
            phase: status.phase.into(),
            preparation_ends_at: format_system_time(status.preparation_ends_at),
            phase_remaining_ms: phase_end
                .duration_since(now)
                .unwrap_or(Duration::ZERO)
                .as_millis() as u64,
            server_time: format_system_time(now),
            winner: status.winner.as_ref().map(WinnerSummary::from),
        }
    }
}

/// Winner lookup for a specific round.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundWinnerResponse {
    /// Round that was queried.
    pub round_id: String,
    /// Recorded winner, if any.
    pub winner: Option<WinnerSummary>,
}

/// Request to start a round immediately, ending any live one.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoundRequest {
    /// Mode whose round is replaced.
    pub game_mode: GameMode,
}

/// Round created by an administrative action.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoundResponse {
    /// Human readable outcome.
    pub message: String,
    /// Freshly opened round.
    pub round: RoundSummary,
}

/// Result of resetting one mode.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetOutcome {
    /// Mode that was reset.
    pub game_mode: GameMode,
    /// Whether a new round was opened.
    pub success: bool,
    /// Round opened for the mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    /// Number of the round opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u64>,
    /// Failure reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-mode results of a reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    /// Summary of the reset.
    pub message: String,
    /// One outcome per configured mode.
    pub results: Vec<ResetOutcome>,
}

/// Round with its timing relative to the server clock.
#[derive(Debug, Serialize, ToSchema)]
pub struct DebugRound {
    /// Stored round.
    #[serde(flatten)]
    pub round: RoundSummary,
    /// Phase at the server clock.
    pub phase: VisibleRoundPhase,
    /// Negative once the end time has passed.
    pub time_until_end_ms: i64,
    /// Negative while the round is still running.
    pub time_since_end_ms: i64,
    /// Whether the end time has passed.
    pub is_expired: bool,
}

impl DebugRound {
    /// Annotate `round` with its timing at `now`.
    pub fn new(round: &RoundEntity, phase: RoundPhase, now: SystemTime) -> Self {
        Self {
            round: RoundSummary::from(round),
            phase: phase.into(),
            time_until_end_ms: signed_millis(now, round.end_time),
            time_since_end_ms: signed_millis(round.end_time, now),
            is_expired: now >= round.end_time,
        }
    }
}

/// Diagnostic dump of every stored round.
#[derive(Debug, Serialize, ToSchema)]
pub struct DebugResponse {
    /// RFC 3339 server clock.
    pub current_time: String,
    /// Number of stored rounds.
    pub total_rounds: usize,
    /// Every round, newest first.
    pub rounds: Vec<DebugRound>,
    /// Timing summaries per instrumented operation.
    #[schema(value_type = Object)]
    pub operations: IndexMap<String, OperationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_tracks_the_current_phase() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let round = RoundEntity::open(GameMode::Short, 1, start);
        let status = RoundStatus {
            preparation_ends_at: round.preparation_ends_at(Duration::from_secs(30)),
            round,
            phase: RoundPhase::Preparation,
            winner: None,
        };

        let response = RoundStatusResponse::new(&status, start + Duration::from_secs(70));
        assert_eq!(response.phase, VisibleRoundPhase::Preparation);
        assert_eq!(response.phase_remaining_ms, 20_000);
        assert!(response.winner.is_none());
    }

    #[test]
    fn debug_round_reports_negative_time_once_expired() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let round = RoundEntity::open(GameMode::Short, 1, start);

        let late = DebugRound::new(
            &round,
            RoundPhase::Preparation,
            start + Duration::from_secs(65),
        );
        assert_eq!(late.time_until_end_ms, -5_000);
        assert_eq!(late.time_since_end_ms, 5_000);
        assert!(late.is_expired);
    }
}
