//! Detection state machine: per-frame orchestration of throttling, the
//! adaptive yawn detector, event resolution, scoring, and state
//! transitions.

use crate::config::VigilConfig;
use crate::domain::{FatigueEvent, FatigueLevel, FrameError, FrameInput, OperatingState};
use crate::observer::{DetectionObserver, NoopNavigator, RestLocationNavigator};
use crate::score::ScoreEngine;

use vigil_signals::{FrameThrottle, RollingWindow, YawnDetector};

/// Frame-rate-limited fatigue state machine.
///
/// Owns one [`ScoreEngine`] and one [`YawnDetector`] per session; both are
/// reset at `start_detection` and never shared. Entry/exit side effects are
/// observer notifications only — the engine performs no I/O.
///
/// Single-writer: callers must serialize `process_frame` delivery (the
/// whole per-frame pipeline is cheap and must be atomic with respect to
/// state transitions).
pub struct DetectionEngine {
    cfg: VigilConfig,
    observer: Box<dyn DetectionObserver>,
    navigator: Box<dyn RestLocationNavigator>,

    score: ScoreEngine,
    yawn: YawnDetector,
    throttle: FrameThrottle,
    blink_window: RollingWindow,
    yawn_window: RollingWindow,

    state: OperatingState,
    /// State interrupted by `NoFace`, restored on the next detected face.
    last_known_state: OperatingState,
    no_face_frames: u32,
    cooldown_until: i64,
    warning_dialog_active: bool,

    face_detected: bool,
    eye_closure_since: Option<i64>,
    last_frame_ts: i64,
    mouth_open_count: u64,
    calibration_percent: u8,
    last_error: Option<FrameError>,
}

impl DetectionEngine {
    /// Engine with default configuration and no navigation capability.
    pub fn new(observer: Box<dyn DetectionObserver>) -> Self {
        Self::with_config(VigilConfig::default(), observer, Box::new(NoopNavigator))
    }

    pub fn with_config(
        cfg: VigilConfig,
        observer: Box<dyn DetectionObserver>,
        navigator: Box<dyn RestLocationNavigator>,
    ) -> Self {
        let score = ScoreEngine::new(cfg.score.clone());
        let yawn = YawnDetector::new(cfg.yawn.clone());
        let throttle = FrameThrottle::new(cfg.pipeline.min_process_interval_ms);
        Self {
            cfg,
            observer,
            navigator,
            score,
            yawn,
            throttle,
            blink_window: RollingWindow::new(),
            yawn_window: RollingWindow::new(),
            state: OperatingState::Initializing,
            last_known_state: OperatingState::Detecting,
            no_face_frames: 0,
            cooldown_until: 0,
            warning_dialog_active: false,
            face_detected: false,
            eye_closure_since: None,
            last_frame_ts: 0,
            mouth_open_count: 0,
            calibration_percent: 0,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin a detection session. Resets score, adaptive detector,
    /// cooldown, and all session counters.
    pub fn start_detection(&mut self) {
        self.reset_session_state();
        self.transition_to(OperatingState::Detecting);
    }

    /// End the session. Terminal: subsequent frames are dropped whole.
    pub fn stop_detection(&mut self) {
        self.transition_to(OperatingState::Shutdown);
    }

    pub fn start_calibration(&mut self) {
        self.calibration_percent = 0;
        self.transition_to(OperatingState::Calibrating);
    }

    pub fn stop_calibration(&mut self) {
        self.transition_to(OperatingState::Detecting);
    }

    /// Calibration progress pass-through from the external calibration
    /// subsystem. The last reported percent stays queryable via
    /// [`Self::calibration_percent`].
    pub fn calibration_progress(&mut self, percent: u8, current_ear: f32) {
        self.calibration_percent = percent;
        self.observer.on_calibration_progress(percent, current_ear);
    }

    pub fn calibration_completed(&mut self, summary: crate::domain::CalibrationSummary) {
        self.transition_to(OperatingState::Detecting);
        self.observer.on_calibration_completed(&summary);
    }

    /// User pressed "I am awake": opens the cooldown window, closes the
    /// dialog, and returns to plain detection. While the cooldown lasts,
    /// alert states are suppressed and recovery runs at the fast rate.
    pub fn acknowledge_warning(&mut self, now_ms: i64) {
        self.cooldown_until = now_ms + self.cfg.pipeline.cooldown_ms;
        self.set_warning_dialog(false);
        self.observer.on_user_acknowledged();
        self.transition_to(OperatingState::Detecting);
    }

    /// User asked for a rest stop: stop alerting, hand off to the injected
    /// navigator (fire-and-forget), and park in `RestMode`.
    pub fn request_rest(&mut self) {
        self.set_warning_dialog(false);
        self.observer.on_user_requested_rest();
        self.navigator.open_nearest_rest_stop();
        self.transition_to(OperatingState::RestMode);
    }

    /// Full reset: clears every piece of per-session state including a
    /// recorded error, and returns to `Detecting`. This and
    /// `start_detection` are the only exits from `Error`.
    pub fn reset_session(&mut self) {
        self.reset_session_state();
        self.set_warning_dialog(false);
        self.transition_to(OperatingState::Detecting);
    }

    pub fn set_min_process_interval_ms(&mut self, interval_ms: i64) {
        self.throttle.set_min_interval_ms(interval_ms);
    }

    /// Target processing rate; out-of-range values clamp to 1..=60 fps.
    pub fn set_processing_rate_fps(&mut self, fps: i32) {
        self.throttle.set_fps(fps);
    }

    // ------------------------------------------------------------------
    // Per-frame pipeline
    // ------------------------------------------------------------------

    /// Ingest one frame result from the external landmark extractor.
    ///
    /// Frames are dropped whole in `Shutdown`/`Error` and below the
    /// throttle interval. A per-frame fault aborts the frame without
    /// touching score or detector state and parks the machine in `Error`.
    pub fn process_frame(&mut self, frame: &FrameInput) {
        if matches!(
            self.state,
            OperatingState::Shutdown | OperatingState::Error
        ) {
            return;
        }
        if !self.throttle.accept(frame.ts_ms) {
            return;
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.evaluate_frame(frame)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::error!("frame fault at ts={}: {}", frame.ts_ms, err);
                self.last_error = Some(err);
                self.transition_to(OperatingState::Error);
            }
            Err(_) => {
                log::error!("frame evaluation panicked at ts={}", frame.ts_ms);
                self.last_error = Some(FrameError::Panicked);
                self.transition_to(OperatingState::Error);
            }
        }
    }

    fn evaluate_frame(&mut self, frame: &FrameInput) -> Result<(), FrameError> {
        let now = frame.ts_ms;

        // Validate geometry before any state is touched so a faulty frame
        // aborts without partial mutation.
        if let Some(ratio) = frame.mouth_open_ratio {
            if !ratio.is_finite() {
                return Err(FrameError::NonFiniteRatio(ratio));
            }
            if ratio < 0.0 {
                return Err(FrameError::NegativeRatio(ratio));
            }
        }

        // Calibration gates out everything except progress pass-through.
        if self.state == OperatingState::Calibrating {
            return Ok(());
        }

        self.last_frame_ts = now;

        let mut adaptive_trigger = false;
        if let Some(ratio) = frame.mouth_open_ratio {
            let sample = self.yawn.update(ratio, now);
            if sample.triggered {
                adaptive_trigger = true;
                self.yawn_window.push(now);
            }
        }

        for event in &frame.events {
            match event {
                FatigueEvent::Blink => {
                    self.blink_window.push(now);
                    self.observer.on_blink();
                }
                FatigueEvent::Yawn => self.yawn_window.push(now),
                FatigueEvent::MouthOpen => self.mouth_open_count += 1,
                FatigueEvent::EyeClosure => {}
            }
        }

        self.face_detected = frame.face_detected;
        if frame.face_detected {
            self.no_face_frames = 0;
            if self.state == OperatingState::NoFace {
                let restore = self.last_known_state;
                self.transition_to(restore);
            }
            self.handle_alerts(frame, adaptive_trigger, now);
        } else {
            self.eye_closure_since = None;
            self.no_face_frames += 1;
            if self.no_face_frames >= self.cfg.pipeline.no_face_frame_threshold
                && self.state != OperatingState::NoFace
            {
                self.transition_to(OperatingState::NoFace);
                self.no_face_frames = 0;
            }
        }
        Ok(())
    }

    /// Exclusive event resolution (first match wins), scoring, and the
    /// level-driven transition.
    fn handle_alerts(&mut self, frame: &FrameInput, adaptive_trigger: bool, now: i64) {
        if matches!(
            self.state,
            OperatingState::Calibrating
                | OperatingState::NoFace
                | OperatingState::Error
                | OperatingState::Shutdown
        ) {
            return;
        }

        if frame.has_event(FatigueEvent::EyeClosure) {
            self.eye_closure_since.get_or_insert(now);
        } else {
            self.eye_closure_since = None;
        }

        let in_cooldown = self.is_in_cooldown(now);
        if frame.has_event(FatigueEvent::EyeClosure) {
            // Sustained eye closure is the strongest indicator.
            self.score.add_eye_closure_penalty();
        } else if adaptive_trigger || frame.has_event(FatigueEvent::Yawn) {
            self.score.add_yawn_penalty(now);
        } else if self.blink_window.count_within(self.cfg.pipeline.blink_window_ms, now)
            > self.cfg.pipeline.blink_count_threshold
        {
            self.score.add_blink_penalty();
        } else {
            self.score.recover(now, in_cooldown);
        }

        let score = self.score.score();
        let level = self.score.level();
        self.observer.on_fatigue_score_updated(score, level);

        // During the acknowledgment cooldown no dialog re-triggers: report
        // plain detection even if the computed level says otherwise.
        if in_cooldown {
            self.transition_to(OperatingState::Detecting);
            return;
        }

        if frame.fatigue_detected {
            match level {
                FatigueLevel::Warning => self.transition_to(OperatingState::Warning),
                FatigueLevel::Notice => self.transition_to(OperatingState::Notice),
                FatigueLevel::Normal => self.transition_to(OperatingState::Detecting),
            }
        } else {
            self.transition_to(OperatingState::Detecting);
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Re-entering the current state is a no-op; a real change runs the old
    /// state's exit action then the new state's entry action exactly once.
    fn transition_to(&mut self, new_state: OperatingState) {
        if self.state == new_state {
            return;
        }
        let previous = self.state;
        if new_state == OperatingState::NoFace {
            self.last_known_state = previous;
        }
        self.handle_state_exit(previous);
        self.state = new_state;
        log::debug!("state transition: {:?} -> {:?}", previous, new_state);
        self.handle_state_enter(new_state);
    }

    fn handle_state_exit(&mut self, state: OperatingState) {
        if state == OperatingState::Warning {
            self.set_warning_dialog(false);
        }
    }

    fn handle_state_enter(&mut self, state: OperatingState) {
        match state {
            OperatingState::NoFace => self.observer.on_no_face_detected(),
            OperatingState::Warning => {
                self.observer.on_warning_fatigue();
                self.set_warning_dialog(true);
            }
            OperatingState::Notice => self.observer.on_notice_fatigue(),
            OperatingState::Detecting => self.observer.on_normal_detection(),
            OperatingState::Calibrating => self.observer.on_calibration_started(),
            OperatingState::Error => {
                self.set_warning_dialog(false);
                self.observer.on_error();
            }
            OperatingState::RestMode => {
                self.set_warning_dialog(false);
                self.observer.on_rest_mode();
            }
            OperatingState::Shutdown => {
                self.set_warning_dialog(false);
                self.observer.on_shutdown();
            }
            OperatingState::Initializing => {}
        }
    }

    /// Edge-triggered dialog flag: the observer sees each change exactly
    /// once no matter how many paths request it.
    fn set_warning_dialog(&mut self, active: bool) {
        if self.warning_dialog_active != active {
            self.warning_dialog_active = active;
            self.observer.set_warning_dialog_active(active);
        }
    }

    fn reset_session_state(&mut self) {
        self.score.reset();
        self.yawn.reset();
        self.throttle.reset();
        self.blink_window.reset();
        self.yawn_window.reset();
        self.cooldown_until = 0;
        self.no_face_frames = 0;
        self.face_detected = false;
        self.eye_closure_since = None;
        self.mouth_open_count = 0;
        self.calibration_percent = 0;
        self.last_error = None;
        self.last_known_state = OperatingState::Detecting;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> OperatingState {
        self.state
    }

    #[inline]
    pub fn score(&self) -> u8 {
        self.score.score()
    }

    #[inline]
    pub fn level(&self) -> FatigueLevel {
        self.score.level()
    }

    #[inline]
    pub fn is_in_cooldown(&self, now_ms: i64) -> bool {
        now_ms < self.cooldown_until
    }

    /// Combined yawn count: adaptive-detector triggers plus externally
    /// reported yawn events, since session start.
    #[inline]
    pub fn yawn_count(&self) -> u64 {
        self.yawn_window.total()
    }

    pub fn recent_yawn_count(&mut self, window_ms: i64, now_ms: i64) -> usize {
        self.yawn_window.count_within(window_ms, now_ms)
    }

    #[inline]
    pub fn blink_count(&self) -> u64 {
        self.blink_window.total()
    }

    pub fn recent_blink_count(&mut self, window_ms: i64, now_ms: i64) -> usize {
        self.blink_window.count_within(window_ms, now_ms)
    }

    #[inline]
    pub fn mouth_open_count(&self) -> u64 {
        self.mouth_open_count
    }

    /// Duration of the ongoing eye closure, up to the last processed
    /// frame. Zero when eyes are open.
    pub fn eye_closure_duration_ms(&self) -> i64 {
        match self.eye_closure_since {
            Some(since) => (self.last_frame_ts - since).max(0),
            None => 0,
        }
    }

    #[inline]
    pub fn is_face_detected(&self) -> bool {
        self.face_detected
    }

    #[inline]
    pub fn is_calibrating(&self) -> bool {
        self.state == OperatingState::Calibrating
    }

    /// Last reported calibration progress percent; 0 until the external
    /// calibration subsystem reports anything.
    #[inline]
    pub fn calibration_percent(&self) -> u8 {
        self.calibration_percent
    }

    pub fn last_error(&self) -> Option<&FrameError> {
        self.last_error.as_ref()
    }

    pub fn config(&self) -> &VigilConfig {
        &self.cfg
    }
}
