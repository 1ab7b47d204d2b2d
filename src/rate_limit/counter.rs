//! Window counters behind the request limiter.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

/// Hits recorded in the current fixed window of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Hits counted in the window.
    pub count: u32,
    /// Instant the window closes.
    pub reset_at: SystemTime,
}

/// Backend holding window counters.
///
/// The in-process [`MemoryCounter`] only limits a single server instance; a
/// shared implementation makes the limits global across instances.
pub trait CountingStore: Send + Sync {
    /// Current window of `key`, if it has one.
    fn get(&self, key: &str) -> Option<WindowCount>;
    /// Count one hit for `key`, opening a new `window` when the previous one
    /// expired. Returns the window after the hit.
    fn increment(&self, key: &str, window: Duration, now: SystemTime) -> WindowCount;
    /// Drop windows that expired before `now`. Returns how many were dropped.
    fn expire(&self, now: SystemTime) -> usize;
}

/// Counters kept in a concurrent map.
#[derive(Default)]
pub struct MemoryCounter {
    windows: DashMap<String, WindowCount>,
}

impl MemoryCounter {
    /// Empty counter map.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CountingStore for MemoryCounter {
    fn get(&self, key: &str) -> Option<WindowCount> {
        self.windows.get(key).map(|entry| *entry)
    }

    fn increment(&self, key: &str, window: Duration, now: SystemTime) -> WindowCount {
        let mut entry = self.windows.entry(key.to_owned()).or_insert(WindowCount {
            count: 0,
            reset_at: now + window,
        });
        if now > entry.reset_at {
            *entry = WindowCount {
                count: 0,
                reset_at: now + window,
            };
        }
        entry.count = entry.count.saturating_add(1);
        *entry
    }

    fn expire(&self, now: SystemTime) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| now <= window.reset_at);
        before.saturating_sub(self.windows.len())
    }
}
