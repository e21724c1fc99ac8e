//! Per-node throttle for filesystem checks.

use std::time::{Duration, Instant};

/// Tracks when a node last looked at the filesystem.
///
/// A gate that was never updated is always elapsed, so the first open of a
/// node always performs a check.
#[derive(Clone, Copy, Debug, Default)]
pub struct StalenessGate {
    last_check: Option<Instant>,
}

impl StalenessGate {
    /// A gate that has never been updated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least `window` has passed since the last [`update`](Self::update).
    pub fn is_elapsed(&self, window: Duration) -> bool {
        self.is_elapsed_at(window, Instant::now())
    }

    /// [`is_elapsed`](Self::is_elapsed) evaluated at `now`.
    pub fn is_elapsed_at(&self, window: Duration, now: Instant) -> bool {
        self.last_check
            .is_none_or(|last| now.saturating_duration_since(last) >= window)
    }

    /// Record a check happening now.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// Record a check happening at `now`.
    pub fn update_at(&mut self, now: Instant) {
        self.last_check = Some(now);
    }

    /// Forget the last check so the next one is not throttled.
    pub fn reset(&mut self) {
        self.last_check = None;
    }

    /// When the last check happened.
    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }
}
