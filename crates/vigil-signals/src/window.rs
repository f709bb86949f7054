//! Trailing-window event counting.

use std::collections::VecDeque;

/// Timestamp ring for "how many events in the last N ms" queries.
///
/// Stamps are expected in roughly increasing order; expired entries are
/// pruned on query.
#[derive(Debug, Clone, Default)]
pub struct RollingWindow {
    stamps: VecDeque<i64>,
    total: u64,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event at `ts_ms`.
    pub fn push(&mut self, ts_ms: i64) {
        self.stamps.push_back(ts_ms);
        self.total += 1;
    }

    /// Number of events within the trailing `window_ms` ending at `now_ms`.
    pub fn count_within(&mut self, window_ms: i64, now_ms: i64) -> usize {
        let cutoff = now_ms - window_ms;
        while matches!(self.stamps.front(), Some(&ts) if ts < cutoff) {
            self.stamps.pop_front();
        }
        self.stamps.iter().filter(|&&ts| ts <= now_ms).count()
    }

    /// Total events recorded since the last reset, regardless of age.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        self.stamps.clear();
        self.total = 0;
    }
}
