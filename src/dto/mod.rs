use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check payloads.
pub mod health;
/// Leaderboard payloads.
pub mod leaderboard;
/// Client-facing round phase.
pub mod phase;
/// Post submission and listing payloads.
pub mod post;
/// Presence socket payloads.
pub mod presence;
/// Round status, winner and admin payloads.
pub mod round;
/// Server-sent event payloads.
pub mod sse;
/// Validation helpers shared by request bodies.
pub mod validation;
/// Vote payloads.
pub mod vote;

/// RFC 3339 rendering of `time`.
pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Milliseconds since the Unix epoch, saturating at zero for earlier instants.
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Signed milliseconds from `from` to `to`.
fn signed_millis(from: SystemTime, to: SystemTime) -> i64 {
    match to.duration_since(from) {
        Ok(ahead) => ahead.as_millis() as i64,
        Err(behind) => -(behind.duration().as_millis() as i64),
    }
}
