use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::presence::PresenceQuery, error::AppError, services::presence_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws/presence",
    tag = "presence",
    params(PresenceQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Blank presence key")
    )
)]
/// Upgrade into a presence session counted under `key` until it closes.
pub async fn presence_socket(
    State(state): State<SharedState>,
    Query(query): Query<PresenceQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let key = query.key.trim().to_owned();
    if key.is_empty() {
        return Err(AppError::BadRequest("presence key must not be blank".into()));
    }
    Ok(ws.on_upgrade(move |socket| presence_service::handle_socket(state, socket, key)))
}

/// Configure the presence WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/presence", get(presence_socket))
}
