use std::time::Duration;

use dashmap::DashMap;
use tokio::{
    sync::{Notify, watch},
    time::sleep,
};

/// Default delay used to coalesce bursts of joins and leaves.
pub const DEFAULT_PRESENCE_THROTTLE: Duration = Duration::from_millis(500);

/// Counts distinct presence keys across open connections.
///
/// A key may be held by several connections (tabs); it stays online until the
/// last of them leaves. Recomputations are throttled so a storm of
/// connections produces a single published count.
pub struct PresenceAggregator {
    members: DashMap<String, usize>,
    dirty: Notify,
    online: watch::Sender<usize>,
    throttle: Duration,
}

impl PresenceAggregator {
    /// Empty aggregator publishing at most once per `throttle`.
    pub fn new(throttle: Duration) -> Self {
        let (online, _rx) = watch::channel(0);
        Self {
            members: DashMap::new(),
            dirty: Notify::new(),
            online,
            throttle,
        }
    }

    /// Register one connection for `key`.
    pub fn join(&self, key: &str) {
        *self.members.entry(key.to_owned()).or_insert(0) += 1;
        self.dirty.notify_one();
    }

    /// Drop one connection for `key`, forgetting the key with its last connection.
    pub fn leave(&self, key: &str) {
        if let Some(mut connections) = self.members.get_mut(key) {
            *connections = connections.saturating_sub(1);
        }
        self.members.remove_if(key, |_, connections| *connections == 0);
        self.dirty.notify_one();
    }

    /// Distinct keys right now, ignoring the throttle.
    pub fn distinct_keys(&self) -> usize {
        self.members.len()
    }

    /// Last published count.
    pub fn online(&self) -> usize {
        *self.online.borrow()
    }

    /// Receive every published count.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.online.subscribe()
    }

    /// Wait for membership to change, let the throttle window absorb further
    /// changes, then publish. Returns the new count when it differs from the
    /// previous one.
    pub async fn next_update(&self) -> Option<usize> {
        self.dirty.notified().await;
        sleep(self.throttle).await;

        let count = self.distinct_keys();
        let changed = self.online.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
        changed.then_some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_sharing_a_key_count_once() {
        let presence = PresenceAggregator::new(DEFAULT_PRESENCE_THROTTLE);
        presence.join("alice");
        presence.join("alice");
        presence.join("bob");
        assert_eq!(presence.distinct_keys(), 2);

        presence.leave("alice");
        assert_eq!(presence.distinct_keys(), 2);
        presence.leave("alice");
        assert_eq!(presence.distinct_keys(), 1);
    }

    #[test]
    fn leaving_an_unknown_key_is_harmless() {
        let presence = PresenceAggregator::new(DEFAULT_PRESENCE_THROTTLE);
        presence.leave("ghost");
        assert_eq!(presence.distinct_keys(), 0);
    }

    #[tokio::test]
    async fn bursts_publish_a_single_update() {
        let presence = PresenceAggregator::new(Duration::from_millis(10));
        let mut updates = presence.subscribe();
        for key in ["a", "b", "c", "a"] {
            presence.join(key);
        }

        assert_eq!(presence.next_update().await, Some(3));
        assert_eq!(presence.online(), 3);
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), 3);
    }

    #[tokio::test]
    async fn unchanged_count_is_not_republished() {
        let presence = PresenceAggregator::new(Duration::from_millis(5));
        presence.join("a");
        assert_eq!(presence.next_update().await, Some(1));

        presence.join("a");
        assert_eq!(presence.next_update().await, None);
        assert_eq!(presence.online(), 1);
    }
}
