//! Driver-fatigue decision core.
//!
//! Consumes per-frame results from an external face/landmark extractor and
//! turns them into a bounded fatigue score, discrete operating states, and
//! observer notifications. The crate is pure decision logic: no camera,
//! no rendering, no I/O beyond optional TOML configuration.
//!
//! Pipeline per accepted frame: throttle gate, geometry validation,
//! adaptive yawn overlay, face presence debounce, exclusive event
//! resolution into the score engine, then a level-driven state transition.
//!
//! ```
//! use vigil_core::{DetectionEngine, FrameInput, NullObserver, OperatingState};
//!
//! let mut engine = DetectionEngine::new(Box::new(NullObserver));
//! engine.start_detection();
//! engine.process_frame(&FrameInput {
//!     ts_ms: 0,
//!     face_detected: true,
//!     events: vec![],
//!     mouth_open_ratio: Some(0.25),
//!     fatigue_detected: false,
//! });
//! assert_eq!(engine.state(), OperatingState::Detecting);
//! assert_eq!(engine.score(), 0);
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod observer;
pub mod score;

#[cfg(test)]
mod tests_engine;

pub use config::{ConfigError, PipelineConfig, ScoreConfig, VigilConfig};
pub use domain::{
    CalibrationSummary, FatigueEvent, FatigueLevel, FrameError, FrameInput, OperatingState,
};
pub use engine::DetectionEngine;
pub use observer::{DetectionObserver, NoopNavigator, NullObserver, RestLocationNavigator};
pub use score::ScoreEngine;

pub use vigil_signals::{FrameThrottle, RollingWindow, YawnConfig, YawnDetector};
