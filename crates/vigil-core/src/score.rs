//! Bounded fatigue score with asymmetric penalty/recovery dynamics.

use crate::config::ScoreConfig;
use crate::domain::FatigueLevel;

/// Integer score in `[0, 100]`. Penalties are immediate and capped;
/// recovery is slower than accrual and frozen inside the post-yawn hold
/// window, so the score cannot oscillate rapidly around alert thresholds.
///
/// One engine per active session, owned by the detection state machine.
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    cfg: ScoreConfig,
    score: u8,
    /// Start of the currently-accruing recovery period.
    recover_anchor: Option<i64>,
    /// Timestamp of the most recent `recover` call, used to spot gaps.
    last_recover_call: Option<i64>,
    /// Period the anchor accrued under; a rate switch re-anchors.
    last_period: Option<i64>,
    /// Recovery is frozen until this timestamp.
    hold_until: i64,
}

impl ScoreEngine {
    pub fn new(cfg: ScoreConfig) -> Self {
        Self {
            cfg,
            score: 0,
            recover_anchor: None,
            last_recover_call: None,
            last_period: None,
            hold_until: 0,
        }
    }

    /// Zero the score and clear recovery/hold bookkeeping.
    pub fn reset(&mut self) {
        self.score = 0;
        self.recover_anchor = None;
        self.last_recover_call = None;
        self.last_period = None;
        self.hold_until = 0;
    }

    #[inline]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[inline]
    pub fn level(&self) -> FatigueLevel {
        FatigueLevel::from_score(self.score)
    }

    /// Yawn: add the penalty and freeze recovery for at least the hold
    /// window, modeling a sustained fatigue signal.
    pub fn add_yawn_penalty(&mut self, now_ms: i64) {
        self.score = self.score.saturating_add(self.cfg.yawn_penalty).min(100);
        self.hold_until = self.hold_until.max(now_ms + self.cfg.hold_after_yawn_ms);
    }

    /// Excessive blinking: flat penalty.
    pub fn add_blink_penalty(&mut self) {
        self.score = self.score.saturating_add(self.cfg.blink_penalty).min(100);
    }

    /// Sustained eye closure: raise the score to at least the floor.
    /// Never lowers an already-higher score.
    pub fn add_eye_closure_penalty(&mut self) {
        self.score = self.score.max(self.cfg.eye_closure_floor);
    }

    /// Time-based recovery step. No-op while the hold window is active.
    ///
    /// The first call after a gap (engine reset, expired hold, a silence
    /// longer than two periods, or a rate switch) only records a time
    /// anchor, so a stale anchor can never produce a large first-tick
    /// drop. After that the score steps down by one `step` per whole
    /// elapsed period: 1 point per 1500 ms normally, 3 points per
    /// 1000 ms when `fast` (the acknowledgment cooldown is active). The
    /// anchor carries sub-period remainders forward, so the rate is
    /// exact at any tick cadence, faster or slower than the period.
    pub fn recover(&mut self, now_ms: i64, fast: bool) {
        if now_ms < self.hold_until {
            return;
        }

        let (step, period) = if fast {
            (self.cfg.fast_recover_step, self.cfg.fast_recover_period_ms)
        } else {
            (self.cfg.recover_step, self.cfg.recover_period_ms)
        };

        let gapped = match (self.recover_anchor, self.last_recover_call) {
            (None, _) | (_, None) => true,
            (Some(anchor), Some(last_call)) => {
                anchor < self.hold_until
                    || self.last_period != Some(period)
                    || now_ms - last_call > 2 * period
            }
        };
        self.last_recover_call = Some(now_ms);
        self.last_period = Some(period);
        if gapped {
            self.recover_anchor = Some(now_ms);
            return;
        }

        // recover_anchor is Some by construction above.
        let Some(anchor) = self.recover_anchor else {
            return;
        };
        let elapsed = now_ms - anchor;
        if elapsed < period {
            return;
        }

        let periods = elapsed / period;
        let drop = u64::from(step).saturating_mul(periods as u64).min(100) as u8;
        self.score = self.score.saturating_sub(drop);
        self.recover_anchor = Some(anchor + periods * period);
    }
}
