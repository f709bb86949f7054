//! # vigil-signals
//!
//! Signal-level building blocks for the Vigil fatigue pipeline.
//!
//! This crate provides:
//! - **Adaptive yawn detection**: EMA smoothing with a self-tuning baseline,
//!   hysteresis, and trigger latching for sustained mouth openings
//! - **Rolling windows**: trailing-window event counts (blinks, yawns)
//! - **Frame throttling**: rate-limiting of per-frame pipeline entry
//!
//! ## Example
//!
//! ```
//! use vigil_signals::{YawnConfig, YawnDetector};
//!
//! let mut detector = YawnDetector::new(YawnConfig::default());
//! for (ratio, ts_ms) in [(0.25, 0), (0.62, 50), (0.64, 800)] {
//!     let sample = detector.update(ratio, ts_ms);
//!     if sample.triggered {
//!         println!("yawn at {} (threshold {:.3})", ts_ms, sample.threshold);
//!     }
//! }
//! ```

pub mod throttle;
pub mod window;
pub mod yawn;

pub use throttle::FrameThrottle;
pub use window::RollingWindow;
pub use yawn::{YawnConfig, YawnDetector, YawnSample};
