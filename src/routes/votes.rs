use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::vote::{CastVoteRequest, CastVoteResponse},
    error::AppError,
    rate_limit::ClientIp,
    services::vote_service,
    state::SharedState,
};

/// Voting.
pub fn router() -> Router<SharedState> {
    Router::new().route("/votes", post(cast_vote))
}

/// Up- or downvote a post of the current round. One vote per wallet and post.
#[utoipa::path(
    post,
    path = "/votes",
    tag = "votes",
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = CastVoteResponse),
        (status = 400, description = "Invalid wallet, or post outside the round"),
        (status = 404, description = "Unknown round or post"),
        (status = 409, description = "Already voted, or round closed"),
        (status = 429, description = "Request or per-round limit reached")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Valid(Json(payload)): Valid<Json<CastVoteRequest>>,
) -> Result<Json<CastVoteResponse>, AppError> {
    Ok(Json(vote_service::cast_vote(&state, &ip, payload).await?))
}
