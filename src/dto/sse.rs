//! Server-sent event payloads.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{
    phase::VisibleRoundPhase,
    round::{RoundSummary, WinnerSummary},
};
use crate::dao::models::GameMode;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name, `None` for the default `message`.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Distinct clients currently online.
    pub online: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether the service runs without storage.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a mode's current round or its phase changes.
pub struct RoundPhaseEvent {
    /// Mode that changed.
    pub game_mode: GameMode,
    /// New phase.
    pub phase: VisibleRoundPhase,
    /// Current round of the mode.
    pub round: RoundSummary,
    /// RFC 3339 end of the preparation window.
    pub preparation_ends_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once a round's winner is known.
pub struct WinnerEvent {
    /// Mode of the round.
    pub game_mode: GameMode,
    /// Round that was won.
    pub round_id: String,
    /// Winning post.
    pub winner: WinnerSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the online count changes.
pub struct PresenceEvent {
    /// Distinct clients currently connected.
    pub online: usize,
}
