//! Frame-rate limiting for pipeline entry.

/// Accepts a frame iff at least `min_interval_ms` elapsed since the last
/// accepted frame. Only frames that pass the gate reach the rest of the
/// pipeline; the stored timestamp advances on every acceptance.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval_ms: i64,
    last_accepted_ts: Option<i64>,
}

impl FrameThrottle {
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            min_interval_ms,
            last_accepted_ts: None,
        }
    }

    /// Evaluate the gate for a frame at `now_ms`; records the timestamp
    /// when the frame is accepted.
    pub fn accept(&mut self, now_ms: i64) -> bool {
        let ok = match self.last_accepted_ts {
            None => true,
            Some(last) => now_ms - last >= self.min_interval_ms,
        };
        if ok {
            self.last_accepted_ts = Some(now_ms);
        }
        ok
    }

    pub fn set_min_interval_ms(&mut self, interval_ms: i64) {
        self.min_interval_ms = interval_ms;
    }

    /// Derive the interval from a target frame rate; out-of-range values
    /// clamp to 1..=60 fps rather than failing.
    pub fn set_fps(&mut self, fps: i32) {
        self.min_interval_ms = 1_000 / i64::from(fps.clamp(1, 60));
    }

    #[inline]
    pub fn min_interval_ms(&self) -> i64 {
        self.min_interval_ms
    }

    pub fn reset(&mut self) {
        self.last_accepted_ts = None;
    }
}
