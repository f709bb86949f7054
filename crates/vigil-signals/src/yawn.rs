//! Adaptive mouth-opening ("yawn") detection.
//!
//! Turns a noisy continuous openness ratio into discrete sustained-opening
//! events. The detector low-pass filters the raw ratio (EMA), tracks the
//! subject's resting level with a slowly-adapting baseline, and fires only
//! when the smoothed signal stays above a dynamic threshold for a minimum
//! hold duration. A latch plus cooldown prevents one prolonged opening from
//! being counted more than once.

use serde::{Deserialize, Serialize};

/// Tuning for the adaptive yawn detector.
///
/// Defaults use the raw mouth-aspect-ratio parameterization: the input is
/// vertical lip separation over horizontal mouth width, resting near 0.25
/// for a closed mouth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YawnConfig {
    /// EMA smoothing factor; larger reacts faster, smaller is smoother.
    pub alpha: f32,
    /// Baseline learning rate, much smaller than `alpha`.
    pub baseline_alpha: f32,
    /// Initial baseline (resting mouth-aspect-ratio).
    pub baseline_seed: f32,
    /// Baseline only adapts while `ema < baseline * baseline_gate`.
    pub baseline_gate: f32,
    /// Trigger threshold is `baseline * k_over_baseline`.
    pub k_over_baseline: f32,
    /// Release line is `threshold * release_ratio` (hysteresis band).
    pub release_ratio: f32,
    /// Signal must stay above threshold this long before firing.
    pub open_hold_ms: i64,
    /// No re-trigger within this window after a fire.
    pub cooldown_ms: i64,
}

impl Default for YawnConfig {
    fn default() -> Self {
        Self {
            alpha: 0.30,
            baseline_alpha: 0.03,
            baseline_seed: 0.25,
            baseline_gate: 1.2,
            k_over_baseline: 1.5,
            release_ratio: 0.6,
            open_hold_ms: 700,
            cooldown_ms: 2_000,
        }
    }
}

/// Per-update diagnostic output.
#[derive(Debug, Clone, Copy)]
pub struct YawnSample {
    /// A sustained opening was detected on this update.
    pub triggered: bool,
    /// Smoothed openness ratio.
    pub ema: f32,
    /// Current resting baseline.
    pub baseline: f32,
    /// Current trigger threshold (`baseline * k`).
    pub threshold: f32,
}

/// Adaptive sustained-opening detector. One instance per subject/session.
#[derive(Debug, Clone)]
pub struct YawnDetector {
    cfg: YawnConfig,
    ema: Option<f32>,
    baseline: f32,
    above_since: Option<i64>,
    last_fire_ts: Option<i64>,
    latched_high: bool,
}

impl YawnDetector {
    pub fn new(cfg: YawnConfig) -> Self {
        let baseline = cfg.baseline_seed;
        Self {
            cfg,
            ema: None,
            baseline,
            above_since: None,
            last_fire_ts: None,
            latched_high: false,
        }
    }

    /// Feed one smoothing step and evaluate the trigger rules.
    ///
    /// Duration comparisons are plain differences; a negative or zero
    /// elapsed time (repeated or non-monotonic timestamps) counts as
    /// "not yet satisfied", never as an immediate trigger.
    pub fn update(&mut self, raw: f32, ts_ms: i64) -> YawnSample {
        let ema = match self.ema {
            None => raw,
            Some(prev) => self.cfg.alpha * raw + (1.0 - self.cfg.alpha) * prev,
        };
        self.ema = Some(ema);

        // The baseline tracks the resting level: it only adapts while the
        // smoothed signal sits near or below it, so transient openings
        // cannot drag the threshold up.
        if ema < self.baseline * self.cfg.baseline_gate {
            self.baseline =
                self.baseline * (1.0 - self.cfg.baseline_alpha) + ema * self.cfg.baseline_alpha;
        }

        let threshold = self.baseline * self.cfg.k_over_baseline;

        // Cooldown after a fire: no trigger, but the latch may release
        // once the signal drops below the hysteresis line.
        if let Some(fired) = self.last_fire_ts {
            if ts_ms - fired < self.cfg.cooldown_ms {
                self.maybe_release(ema, threshold);
                return self.sample(false, ema, threshold);
            }
        }

        if !self.latched_high && ema >= threshold {
            let since = *self.above_since.get_or_insert(ts_ms);
            if ts_ms - since >= self.cfg.open_hold_ms {
                self.last_fire_ts = Some(ts_ms);
                self.latched_high = true;
                self.above_since = None;
                log::debug!(
                    "yawn trigger: ema={:.3} baseline={:.3} threshold={:.3}",
                    ema,
                    self.baseline,
                    threshold
                );
                return self.sample(true, ema, threshold);
            }
        } else {
            self.maybe_release(ema, threshold);
            if ema < threshold {
                self.above_since = None;
            }
        }

        self.sample(false, ema, threshold)
    }

    /// Restore seed values. Call at session boundaries.
    pub fn reset(&mut self) {
        self.ema = None;
        self.baseline = self.cfg.baseline_seed;
        self.above_since = None;
        self.last_fire_ts = None;
        self.latched_high = false;
    }

    /// Current resting baseline.
    #[inline]
    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    fn maybe_release(&mut self, ema: f32, threshold: f32) {
        if self.latched_high && ema < threshold * self.cfg.release_ratio {
            self.latched_high = false;
            self.above_since = None;
        }
    }

    fn sample(&self, triggered: bool, ema: f32, threshold: f32) -> YawnSample {
        YawnSample {
            triggered,
            ema,
            baseline: self.baseline,
            threshold,
        }
    }
}
