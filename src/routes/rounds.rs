use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::{
        post::RoundPostsResponse,
        round::{RoundQuery, RoundStatusResponse, RoundWinnerResponse},
    },
    error::AppError,
    services::round_service,
    state::SharedState,
};

/// Public round reads.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rounds/current", get(current_round))
        .route("/rounds/{id}/winner", get(round_winner))
        .route("/rounds/{id}/posts", get(round_posts))
}

/// Evaluate the lifecycle of a mode and return its current round.
#[utoipa::path(
    get,
    path = "/rounds/current",
    tag = "rounds",
    params(RoundQuery),
    responses(
        (status = 200, description = "Current round and phase", body = RoundStatusResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn current_round(
    State(state): State<SharedState>,
    Query(query): Query<RoundQuery>,
) -> Result<Json<RoundStatusResponse>, AppError> {
    Ok(Json(round_service::current_round(&state, query.mode).await?))
}

/// Recorded winner of a round.
#[utoipa::path(
    get,
    path = "/rounds/{id}/winner",
    tag = "rounds",
    params(("id" = String, Path, description = "Round identifier, e.g. `short_round-12`")),
    responses(
        (status = 200, description = "Winner, empty until resolved", body = RoundWinnerResponse),
        (status = 404, description = "Unknown round")
    )
)]
pub async fn round_winner(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoundWinnerResponse>, AppError> {
    Ok(Json(round_service::round_winner(&state, id).await?))
}

/// Posts of a round ranked by net score.
#[utoipa::path(
    get,
    path = "/rounds/{id}/posts",
    tag = "rounds",
    params(("id" = String, Path, description = "Round identifier")),
    responses(
        (status = 200, description = "Ranked posts", body = RoundPostsResponse),
        (status = 404, description = "Unknown round")
    )
)]
pub async fn round_posts(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoundPostsResponse>, AppError> {
    Ok(Json(round_service::round_posts(&state, id).await?))
}
