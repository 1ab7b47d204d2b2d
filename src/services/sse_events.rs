use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        format_system_time,
        round::{RoundSummary, WinnerSummary},
        sse::{PresenceEvent, RoundPhaseEvent, ServerEvent, SystemStatus, WinnerEvent},
    },
    state::{SharedState, lifecycle::RoundStatus, winner::WinningPost},
};

const EVENT_ROUND_PHASE: &str = "round.phase";
const EVENT_ROUND_WINNER: &str = "round.winner";
const EVENT_PRESENCE: &str = "presence";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast the current round and phase of a mode.
pub fn broadcast_round_phase(state: &SharedState, status: &RoundStatus) {
    let payload = RoundPhaseEvent {
        game_mode: status.round.game_mode,
        phase: status.phase.into(),
        round: RoundSummary::from(&status.round),
        preparation_ends_at: format_system_time(status.preparation_ends_at),
    };
    send_public_event(state, EVENT_ROUND_PHASE, &payload);
}

/// Broadcast the winner of a round.
pub fn broadcast_round_winner(state: &SharedState, status: &RoundStatus, winner: &WinningPost) {
    let payload = WinnerEvent {
        game_mode: status.round.game_mode,
        round_id: status.round.id.clone(),
        winner: WinnerSummary::from(winner),
    };
    send_public_event(state, EVENT_ROUND_WINNER, &payload);
}

/// Broadcast the online count.
pub fn broadcast_presence(state: &SharedState, online: usize) {
    send_public_event(state, EVENT_PRESENCE, &PresenceEvent { online });
}

/// Broadcast a degraded-mode transition.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_public_event<T: Serialize>(state: &SharedState, event: &'static str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => state.public_sse().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
