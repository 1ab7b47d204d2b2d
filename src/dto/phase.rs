//! Client-facing view of the round phase.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::phase::RoundPhase;

/// Round phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoundPhase {
    /// Accepting posts and votes.
    Active,
    /// Showing the winner while the next round is prepared.
    Preparation,
    /// Retired.
    Ended,
}

impl From<RoundPhase> for VisibleRoundPhase {
    fn from(value: RoundPhase) -> Self {
        match value {
            RoundPhase::Active => VisibleRoundPhase::Active,
            RoundPhase::Preparation => VisibleRoundPhase::Preparation,
            RoundPhase::Ended => VisibleRoundPhase::Ended,
        }
    }
}
