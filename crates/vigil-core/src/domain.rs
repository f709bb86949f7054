//! Domain types for the fatigue decision pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrete operating mode of the detection state machine.
///
/// Exactly one state is current at any time. `NoFace` remembers the state
/// it interrupted so a single recovered frame can restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingState {
    Initializing,
    Calibrating,
    Detecting,
    Notice,
    Warning,
    NoFace,
    RestMode,
    Error,
    Shutdown,
}

/// Severity derived purely from the current score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FatigueLevel {
    Normal,
    Notice,
    Warning,
}

impl FatigueLevel {
    /// Fixed-threshold step function: >= 61 Warning, >= 31 Notice.
    pub fn from_score(score: u8) -> Self {
        match score {
            61.. => FatigueLevel::Warning,
            31.. => FatigueLevel::Notice,
            _ => FatigueLevel::Normal,
        }
    }
}

/// Fatigue-relevant event reported by the external low-level detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatigueEvent {
    /// Sustained eye closure (EAR below threshold for long enough).
    EyeClosure,
    /// Yawn detected by the lower-level detector.
    Yawn,
    /// Single blink.
    Blink,
    /// Mouth opening counted by the lower-level detector; not scored here.
    MouthOpen,
}

/// Per-frame result of the external landmark/geometry extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    /// Frame timestamp in milliseconds.
    pub ts_ms: i64,
    /// A face was found in this frame.
    pub face_detected: bool,
    /// Events derived by the lower-level detector for this frame.
    pub events: Vec<FatigueEvent>,
    /// Continuous mouth-openness ratio (MAR); absent skips the adaptive
    /// detector update for this frame.
    pub mouth_open_ratio: Option<f32>,
    /// The lower-level detector's fatigue flag; gates alert-state
    /// transitions.
    pub fatigue_detected: bool,
}

impl FrameInput {
    pub fn has_event(&self, event: FatigueEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Outcome of an external calibration run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub new_threshold: f32,
    pub min_ear: f32,
    pub max_ear: f32,
    pub avg_ear: f32,
}

/// Per-frame processing fault. Caught at the frame boundary; the frame's
/// mutations are discarded and the machine enters `Error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("mouth openness ratio is not finite: {0}")]
    NonFiniteRatio(f32),
    #[error("mouth openness ratio is negative: {0}")]
    NegativeRatio(f32),
    #[error("frame evaluation panicked")]
    Panicked,
}
