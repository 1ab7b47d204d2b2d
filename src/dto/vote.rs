use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{dao::models::VoteType, dto::validation::validate_wallet_address};

/// One vote on a post of the current round.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    /// Post being voted on.
    pub post_id: Uuid,
    /// Wallet of the voter.
    pub wallet_address: String,
    /// Direction of the vote.
    pub vote_type: VoteType,
    /// Round the post belongs to.
    pub round_id: String,
}

impl Validate for CastVoteRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_wallet_address(&self.wallet_address) {
            errors.add("wallet_address", e);
        }
        if self.round_id.trim().is_empty() {
            errors.add("round_id", validator::ValidationError::new("required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Accepted vote.
#[derive(Debug, Serialize, ToSchema)]
pub struct CastVoteResponse {
    /// Always `true` on acceptance.
    pub success: bool,
    /// Votes the caller's IP may still cast in this round.
    pub remaining_votes: u32,
}
