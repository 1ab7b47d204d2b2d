use std::time::SystemTime;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tracing::warn;

use crate::{
    dto::round::{CreateRoundRequest, CreateRoundResponse, DebugResponse, ResetResponse},
    error::{AppError, ServiceError},
    rate_limit::{ClientIp, RateCategory},
    services::round_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Administrative round operations, guarded by the admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/rounds/create-manual", post(create_round))
        .route("/rounds/reset", post(reset_rounds))
        .route("/rounds/debug", get(debug_rounds))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// End the live round of a mode and start a new one immediately.
#[utoipa::path(
    post,
    path = "/rounds/create-manual",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateRoundRequest,
    responses(
        (status = 200, description = "Round started", body = CreateRoundResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 429, description = "Too many failed admin attempts")
    )
)]
pub async fn create_round(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoundRequest>,
) -> Result<Json<CreateRoundResponse>, AppError> {
    Ok(Json(round_service::create_round(&state, payload).await?))
}

/// Restart every configured mode.
#[utoipa::path(
    post,
    path = "/rounds/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Per-mode results", body = ResetResponse))
)]
pub async fn reset_rounds(
    State(state): State<SharedState>,
) -> Result<Json<ResetResponse>, AppError> {
    Ok(Json(round_service::reset(&state).await?))
}

/// Dump every stored round with its timing and operation metrics.
#[utoipa::path(
    get,
    path = "/rounds/debug",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Round diagnostics", body = DebugResponse))
)]
pub async fn debug_rounds(
    State(state): State<SharedState>,
) -> Result<Json<DebugResponse>, AppError> {
    Ok(Json(round_service::debug(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());

    authorize(&state, &ip, provided.as_deref(), SystemTime::now())?;
    Ok(next.run(req).await)
}

/// Check `provided` against the configured token. Only failed attempts count
/// against the caller's auth budget; once it is spent every attempt is refused
/// until the window resets.
fn authorize(
    state: &SharedState,
    ip: &str,
    provided: Option<&str>,
    now: SystemTime,
) -> Result<(), AppError> {
    let Some(expected) = state.config().admin_token.as_deref() else {
        return Ok(());
    };

    let window = state.limiter().window();
    if let Some(decision) = window.blocked_at(ip, RateCategory::Auth, now) {
        return Err(ServiceError::rate_limited("too many failed admin attempts", decision).into());
    }
    if provided == Some(expected) {
        return Ok(());
    }

    let decision = window.check_at(ip, RateCategory::Auth, now);
    warn!(ip, remaining = decision.remaining, "rejected admin request");
    Err(match provided {
        None => AppError::Unauthorized("missing admin token header `X-Admin-Token`".into()),
        Some(_) => AppError::Unauthorized("invalid admin token".into()),
    })
}
