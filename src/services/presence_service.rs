use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{dto::presence::PresenceUpdate, services::sse_events, state::SharedState};

/// Publish throttled online counts to SSE subscribers for as long as the
/// process runs.
pub async fn run(state: SharedState) {
    loop {
        if let Some(online) = state.presence().next_update().await {
            debug!(online, "presence changed");
            sse_events::broadcast_presence(&state, online);
        }
    }
}

/// Hold one presence connection for `key`: join on connect, push every
/// published count, leave when the client goes away.
pub async fn handle_socket(state: SharedState, socket: WebSocket, key: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut counts = state.presence().subscribe();

    state.presence().join(&key);
    info!(key = %key, "presence connected");

    let initial = *counts.borrow_and_update();
    if send_count(&mut sender, initial).await.is_ok() {
        loop {
            tokio::select! {
                changed = counts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *counts.borrow_and_update();
                    if send_count(&mut sender, online).await.is_err() {
                        break;
                    }
                }
                inbound = receiver.next() => match inbound {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(key = %key, error = %err, "presence socket error");
                        break;
                    }
                },
            }
        }
    }

    state.presence().leave(&key);
    info!(key = %key, "presence disconnected");
}

async fn send_count<S>(sender: &mut S, online: usize) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let payload = match serde_json::to_string(&PresenceUpdate { online }) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize presence update");
            return Ok(());
        }
    };
    sender.send(Message::Text(payload.into())).await
}
