//! Phase of a round relative to its end time.

use std::time::{Duration, SystemTime};

/// Length of the window after a round's end during which the winner is shown.
pub const DEFAULT_PREPARATION_WINDOW: Duration = Duration::from_secs(30);

/// Phase of a round relative to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    /// Accepting posts and votes.
    Active,
    /// Ended; winner displayed while the next round is being prepared.
    Preparation,
    /// Past the preparation window; the round must be retired.
    Ended,
}

/// Classify a round ending at `end_time` at instant `now`.
///
/// The end instant itself already belongs to [`RoundPhase::Preparation`] and
/// `end_time + preparation` to [`RoundPhase::Ended`].
pub fn classify(now: SystemTime, end_time: SystemTime, preparation: Duration) -> RoundPhase {
    if now < end_time {
        RoundPhase::Active
    } else if now < end_time + preparation {
        RoundPhase::Preparation
    } else {
        RoundPhase::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn classify_walks_through_all_phases() {
        let end = at(1_000);
        let prep = DEFAULT_PREPARATION_WINDOW;

        assert_eq!(classify(at(999), end, prep), RoundPhase::Active);
        assert_eq!(classify(at(1_005), end, prep), RoundPhase::Preparation);
        assert_eq!(classify(at(1_031), end, prep), RoundPhase::Ended);
    }

    #[test]
    fn classify_boundaries_are_inclusive_on_the_left() {
        let end = at(1_000);
        let prep = Duration::from_secs(30);

        assert_eq!(classify(end, end, prep), RoundPhase::Preparation);
        assert_eq!(classify(at(1_030), end, prep), RoundPhase::Ended);
        assert_eq!(
            classify(at(1_030) - Duration::from_millis(1), end, prep),
            RoundPhase::Preparation
        );
    }

    #[test]
    fn zero_preparation_skips_straight_to_ended() {
        let end = at(50);
        assert_eq!(classify(end, end, Duration::ZERO), RoundPhase::Ended);
    }
}
