//! Outbound boundaries: state/score notifications and injected
//! capabilities.
//!
//! The core performs no I/O itself. Everything user-visible (dialogs,
//! sounds, vibration, navigation) lives behind these traits; callbacks
//! may be delivered from a background capture context, so implementations
//! that touch presentation state must marshal to their own executor.

use crate::domain::{CalibrationSummary, FatigueLevel};

/// Observer for state machine transitions and score updates.
///
/// Every method has a no-op default so implementors only override what
/// they present.
pub trait DetectionObserver {
    /// Entry into plain `Detecting`.
    fn on_normal_detection(&self) {}
    fn on_notice_fatigue(&self) {}
    fn on_warning_fatigue(&self) {}
    fn on_no_face_detected(&self) {}
    fn on_rest_mode(&self) {}
    fn on_error(&self) {}
    fn on_shutdown(&self) {}

    fn on_calibration_started(&self) {}
    fn on_calibration_progress(&self, _percent: u8, _current_ear: f32) {}
    fn on_calibration_completed(&self, _summary: &CalibrationSummary) {}

    /// Emitted once per accepted, non-calibration frame that reaches
    /// scoring.
    fn on_fatigue_score_updated(&self, _score: u8, _level: FatigueLevel) {}

    /// Exactly one `true` per `Warning` entry; one `false` per `Warning`
    /// exit or acknowledgment.
    fn set_warning_dialog_active(&self, _active: bool) {}

    fn on_blink(&self) {}
    fn on_user_acknowledged(&self) {}
    fn on_user_requested_rest(&self) {}
}

/// Observer that ignores everything. Useful in tests and headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl DetectionObserver for NullObserver {}

/// Capability for the "request rest" user action: look up and present
/// the nearest rest stop. Invoked fire-and-forget from the state
/// machine; the core never waits on or retries it.
pub trait RestLocationNavigator {
    fn open_nearest_rest_stop(&self);
}

/// Navigator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl RestLocationNavigator for NoopNavigator {
    fn open_nearest_rest_stop(&self) {}
}
