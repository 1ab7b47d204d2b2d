use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{AppError, ServiceError},
    rate_limit::{ClientIp, RateCategory},
    services::documentation::ApiDoc,
    state::SharedState,
};

/// Token-guarded round administration.
pub mod admin;
/// Health check route.
pub mod health;
/// Leaderboard route.
pub mod leaderboard;
/// Post submission route.
pub mod posts;
/// Presence WebSocket route.
pub mod presence;
/// Public round reads.
pub mod rounds;
/// Public event stream.
pub mod sse;
/// Vote submission route.
pub mod votes;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let reads = rounds::router()
        .merge(leaderboard::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_general));

    let api_router = health::router()
        .merge(reads)
        .merge(admin::router(state.clone()))
        .merge(posts::router())
        .merge(votes::router())
        .merge(sse::router())
        .merge(presence::router())
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    api_router.with_state(state)
}

/// Apply the general per-IP request budget.
async fn limit_general(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let decision = state.limiter().window().check(&ip, RateCategory::General);
    if !decision.success {
        return Err(ServiceError::rate_limited("too many requests", decision).into());
    }
    Ok(next.run(req).await)
}
