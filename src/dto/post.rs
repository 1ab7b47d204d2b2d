use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::PostEntity,
    dto::{
        format_system_time,
        validation::{validate_post_content, validate_wallet_address},
    },
};

/// Submission of a post to the current round.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    /// 1 to 140 characters.
    pub content: String,
    /// Wallet of the author.
    pub wallet_address: String,
    /// Round the post is submitted to.
    pub round_id: String,
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_post_content(&self.content) {
            errors.add("content", e);
        }
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

/// Post as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostSummary {
    /// Post identifier.
    pub id: Uuid,
    /// Post text.
    pub content: String,
    /// Author of the post.
    pub author_id: Uuid,
    /// Round the post competes in.
    pub round_id: String,
    /// Upvotes received.
    pub upvotes: u64,
    /// Downvotes received.
    pub downvotes: u64,
    /// Upvotes minus downvotes.
    pub net_score: i64,
    /// RFC 3339 submission time.
    pub created_at: String,
}

impl From<&PostEntity> for PostSummary {
    fn from(value: &PostEntity) -> Self {
        Self {
            id: value.id,
            content: value.content.clone(),
            author_id: value.author_id,
            round_id: value.round_id.clone(),
            upvotes: value.upvotes,
            downvotes: value.downvotes,
            net_score: value.net_score(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Accepted post.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePostResponse {
    /// Always `true` on acceptance.
    pub success: bool,
    /// Stored post.
    pub post: PostSummary,
}

/// Posts of a round, best net score first.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundPostsResponse {
    /// Round that was listed.
    pub round_id: String,
    /// Ranked posts.
    pub posts: Vec<PostSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str, wallet: &str, round_id: &str) -> CreatePostRequest {
        CreatePostRequest {
            content: content.into(),
            wallet_address: wallet.into(),
            round_id: round_id.into(),
        }
    }

    #[test]
    fn well_formed_request_passes() {
        assert!(request("gm", "0xabc", "short_round-1").validate().is_ok());
    }

    #[test]
    fn every_bad_field_is_reported() {
        let errors = request("", "0x a", " ").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("content"));
        assert!(fields.contains_key("wallet_address"));
        assert!(fields.contains_key("round_id"));
    }
}
