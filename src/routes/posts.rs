use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::post::{CreatePostRequest, CreatePostResponse},
    error::AppError,
    rate_limit::ClientIp,
    services::post_service,
    state::SharedState,
};

/// Post submission.
pub fn router() -> Router<SharedState> {
    Router::new().route("/posts", post(create_post))
}

/// Submit the caller's post for the current round.
#[utoipa::path(
    post,
    path = "/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post accepted", body = CreatePostResponse),
        (status = 400, description = "Invalid content or wallet"),
        (status = 404, description = "Unknown round"),
        (status = 409, description = "Already posted, or round closed"),
        (status = 429, description = "Request or per-round limit reached")
    )
)]
pub async fn create_post(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Valid(Json(payload)): Valid<Json<CreatePostRequest>>,
) -> Result<Json<CreatePostResponse>, AppError> {
    Ok(Json(post_service::submit_post(&state, &ip, payload).await?))
}
