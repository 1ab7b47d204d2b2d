//! Per-round, per-IP submission quotas.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, SystemTime},
};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct IpActivity {
    posts: u32,
    votes: u32,
    last_seen: SystemTime,
}

/// Per-round, per-IP counters of posts and votes.
pub struct IpQuotaTracker {
    rounds: DashMap<String, HashMap<String, IpActivity>>,
    posts_per_round: u32,
    votes_per_round: u32,
    max_age: Duration,
}

impl IpQuotaTracker {
    /// Tracker allowing `posts_per_round` posts and `votes_per_round` votes per
    /// IP in each round, forgetting IPs idle for longer than `max_age`.
    pub fn new(posts_per_round: u32, votes_per_round: u32, max_age: Duration) -> Self {
        Self {
            rounds: DashMap::new(),
            posts_per_round,
            votes_per_round,
            max_age,
        }
    }

    /// Posts allowed per IP in one round.
    pub fn posts_per_round(&self) -> u32 {
        self.posts_per_round
    }

    /// Votes allowed per IP in one round.
    pub fn votes_per_round(&self) -> u32 {
        self.votes_per_round
    }

    /// Whether `ip` may still post in `round_id`.
    pub fn check_post_limit(&self, ip: &str, round_id: &str) -> bool {
        self.activity(ip, round_id)
            .is_none_or(|activity| activity.posts < self.posts_per_round)
    }

    /// Whether `ip` may still vote in `round_id`.
    pub fn check_vote_limit(&self, ip: &str, round_id: &str) -> bool {
        self.activity(ip, round_id)
            .is_none_or(|activity| activity.votes < self.votes_per_round)
    }

    /// Votes left for `ip` in `round_id`.
    pub fn remaining_votes(&self, ip: &str, round_id: &str) -> u32 {
        let used = self.activity(ip, round_id).map_or(0, |activity| activity.votes);
        self.votes_per_round.saturating_sub(used)
    }

    /// Count one post from `ip` in `round_id`.
    pub fn record_post(&self, ip: &str, round_id: &str) {
        self.record_post_at(ip, round_id, SystemTime::now());
    }

    /// Count one post from `ip` in `round_id`, seen at `now`.
    pub fn record_post_at(&self, ip: &str, round_id: &str, now: SystemTime) {
        self.touch(ip, round_id, now, |activity| activity.posts += 1);
    }

    /// Count one vote from `ip` in `round_id`.
    pub fn record_vote(&self, ip: &str, round_id: &str) {
        self.record_vote_at(ip, round_id, SystemTime::now());
    }

    /// Count one vote from `ip` in `round_id`, seen at `now`.
    pub fn record_vote_at(&self, ip: &str, round_id: &str, now: SystemTime) {
        self.touch(ip, round_id, now, |activity| activity.votes += 1);
    }

    /// Check and count a post in one step. Returns `false`, counting nothing,
    /// when the IP already used its posts for the round.
    pub fn try_reserve_post(&self, ip: &str, round_id: &str, now: SystemTime) -> bool {
        let limit = self.posts_per_round;
        self.touch(ip, round_id, now, |activity| reserve(&mut activity.posts, limit))
    }

    /// Check and count a vote in one step.
    pub fn try_reserve_vote(&self, ip: &str, round_id: &str, now: SystemTime) -> bool {
        let limit = self.votes_per_round;
        self.touch(ip, round_id, now, |activity| reserve(&mut activity.votes, limit))
    }

    /// Hand back a post reserved by a submission that was not stored.
    pub fn release_post(&self, ip: &str, round_id: &str) {
        self.release(ip, round_id, |activity| &mut activity.posts);
    }

    /// Hand back a vote reserved by a submission that was not stored.
    pub fn release_vote(&self, ip: &str, round_id: &str) {
        self.release(ip, round_id, |activity| &mut activity.votes);
    }

    /// Forget every round not listed in `active`.
    pub fn cleanup_old_rounds(&self, active: &HashSet<String>) -> usize {
        let before = self.rounds.len();
        self.rounds.retain(|round_id, _| active.contains(round_id));
        before.saturating_sub(self.rounds.len())
    }

    /// Drop IPs idle for longer than the configured max age, then empty rounds.
    /// Returns how many IP entries were evicted.
    pub fn sweep(&self, now: SystemTime) -> usize {
        let mut evicted = 0;
        for mut round in self.rounds.iter_mut() {
            let before = round.len();
            round.retain(|_, activity| {
                now.duration_since(activity.last_seen)
                    .map_or(true, |idle| idle <= self.max_age)
            });
            evicted += before - round.len();
        }
        self.rounds.retain(|_, ips| !ips.is_empty());
        evicted
    }

    /// Number of rounds currently tracked.
    pub fn tracked_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn activity(&self, ip: &str, round_id: &str) -> Option<IpActivity> {
        self.rounds
            .get(round_id)
            .and_then(|ips| ips.get(ip).copied())
    }

    /// Apply `update` to the activity of `ip` while holding the round's entry.
    fn touch<T>(
        &self,
        ip: &str,
        round_id: &str,
        now: SystemTime,
        update: impl FnOnce(&mut IpActivity) -> T,
    ) -> T {
        let mut ips = self.rounds.entry(round_id.to_owned()).or_default();
        let activity = ips.entry(ip.to_owned()).or_insert(IpActivity {
            posts: 0,
            votes: 0,
            last_seen: now,
        });
        let outcome = update(&mut *activity);
        activity.last_seen = now;
        outcome
    }

    fn release(
        &self,
        ip: &str,
        round_id: &str,
        counter: impl FnOnce(&mut IpActivity) -> &mut u32,
    ) {
        let Some(mut ips) = self.rounds.get_mut(round_id) else {
            return;
        };
        if let Some(activity) = ips.get_mut(ip) {
            let used = counter(activity);
            *used = used.saturating_sub(1);
        }
    }
}

fn reserve(used: &mut u32, limit: u32) -> bool {
    if *used >= limit {
        return false;
    }
    *used += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(10_000 + secs)
    }

    fn tracker() -> IpQuotaTracker {
        IpQuotaTracker::new(1, 10, Duration::from_secs(3_600))
    }

    #[test]
    fn one_post_per_round_per_ip() {
        let quota = tracker();
        assert!(quota.check_post_limit("ip", "short_round-1"));
        quota.record_post_at("ip", "short_round-1", at(0));

        assert!(!quota.check_post_limit("ip", "short_round-1"));
        assert!(quota.check_post_limit("ip", "short_round-2"));
        assert!(quota.check_post_limit("other", "short_round-1"));
    }

    #[test]
    fn vote_quota_counts_down() {
        let quota = tracker();
        for _ in 0..9 {
            quota.record_vote_at("ip", "r", at(0));
        }
        assert_eq!(quota.remaining_votes("ip", "r"), 1);
        assert!(quota.check_vote_limit("ip", "r"));

        quota.record_vote_at("ip", "r", at(1));
        assert_eq!(quota.remaining_votes("ip", "r"), 0);
        assert!(!quota.check_vote_limit("ip", "r"));
    }

    #[test]
    fn cleanup_keeps_only_active_rounds() {
        let quota = tracker();
        quota.record_post_at("ip", "short_round-1", at(0));
        quota.record_post_at("ip", "short_round-2", at(0));

        let active = HashSet::from(["short_round-2".to_owned()]);
        assert_eq!(quota.cleanup_old_rounds(&active), 1);
        assert!(quota.check_post_limit("ip", "short_round-1"));
        assert!(!quota.check_post_limit("ip", "short_round-2"));
    }

    #[test]
    fn sweep_evicts_idle_ips() {
        let quota = tracker();
        quota.record_vote_at("idle", "r", at(0));
        quota.record_vote_at("busy", "r", at(3_000));
        quota.record_vote_at("gone", "s", at(0));

        assert_eq!(quota.sweep(at(3_700)), 2);
        assert_eq!(quota.tracked_rounds(), 1);
        assert_eq!(quota.remaining_votes("busy", "r"), 9);
        assert_eq!(quota.remaining_votes("idle", "r"), 10);
    }

    #[test]
    fn reservations_stop_at_the_limit() {
        let quota = tracker();
        assert!(quota.try_reserve_post("ip", "r", at(0)));
        assert!(!quota.try_reserve_post("ip", "r", at(0)));

        for _ in 0..10 {
            assert!(quota.try_reserve_vote("ip", "r", at(1)));
        }
        assert!(!quota.try_reserve_vote("ip", "r", at(1)));
        assert_eq!(quota.remaining_votes("ip", "r"), 0);
    }

    #[test]
    fn released_reservation_can_be_taken_again() {
        let quota = tracker();
        assert!(quota.try_reserve_post("ip", "r", at(0)));
        quota.release_post("ip", "r");
        assert!(quota.check_post_limit("ip", "r"));
        assert!(quota.try_reserve_post("ip", "r", at(1)));

        quota.release_vote("nobody", "r");
        quota.release_vote("ip", "missing");
        assert_eq!(quota.remaining_votes("ip", "r"), 10);
    }

    #[test]
    fn concurrent_reservations_admit_a_single_post() {
        let quota = std::sync::Arc::new(tracker());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let quota = quota.clone();
                std::thread::spawn(move || quota.try_reserve_post("ip", "r", at(0)))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
    }
}
