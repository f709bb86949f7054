//! End-to-end state machine tests driven through `process_frame`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::domain::{CalibrationSummary, FatigueEvent, FatigueLevel, FrameError, FrameInput};
use crate::engine::DetectionEngine;
use crate::observer::{DetectionObserver, RestLocationNavigator};
use crate::{OperatingState, VigilConfig};

#[derive(Debug, Clone, PartialEq)]
enum Note {
    Normal,
    Notice,
    Warning,
    NoFace,
    Rest,
    Error,
    Shutdown,
    CalibrationStarted,
    CalibrationProgress(u8),
    CalibrationCompleted,
    Score(u8, FatigueLevel),
    Dialog(bool),
    Blink,
    Acknowledged,
    RequestedRest,
}

#[derive(Default)]
struct Recorder {
    notes: RefCell<Vec<Note>>,
}

impl Recorder {
    fn push(&self, note: Note) {
        self.notes.borrow_mut().push(note);
    }

    fn count(&self, wanted: &Note) -> usize {
        self.notes.borrow().iter().filter(|n| *n == wanted).count()
    }

    fn score_updates(&self) -> usize {
        self.notes
            .borrow()
            .iter()
            .filter(|n| matches!(n, Note::Score(..)))
            .count()
    }

    fn last_score(&self) -> Option<(u8, FatigueLevel)> {
        self.notes.borrow().iter().rev().find_map(|n| match n {
            Note::Score(score, level) => Some((*score, *level)),
            _ => None,
        })
    }
}

impl DetectionObserver for Rc<Recorder> {
    fn on_normal_detection(&self) {
        self.push(Note::Normal);
    }
    fn on_notice_fatigue(&self) {
        self.push(Note::Notice);
    }
    fn on_warning_fatigue(&self) {
        self.push(Note::Warning);
    }
    fn on_no_face_detected(&self) {
        self.push(Note::NoFace);
    }
    fn on_rest_mode(&self) {
        self.push(Note::Rest);
    }
    fn on_error(&self) {
        self.push(Note::Error);
    }
    fn on_shutdown(&self) {
        self.push(Note::Shutdown);
    }
    fn on_calibration_started(&self) {
        self.push(Note::CalibrationStarted);
    }
    fn on_calibration_progress(&self, percent: u8, _current_ear: f32) {
        self.push(Note::CalibrationProgress(percent));
    }
    fn on_calibration_completed(&self, _summary: &CalibrationSummary) {
        self.push(Note::CalibrationCompleted);
    }
    fn on_fatigue_score_updated(&self, score: u8, level: FatigueLevel) {
        self.push(Note::Score(score, level));
    }
    fn set_warning_dialog_active(&self, active: bool) {
        self.push(Note::Dialog(active));
    }
    fn on_blink(&self) {
        self.push(Note::Blink);
    }
    fn on_user_acknowledged(&self) {
        self.push(Note::Acknowledged);
    }
    fn on_user_requested_rest(&self) {
        self.push(Note::RequestedRest);
    }
}

#[derive(Default)]
struct NavRecorder {
    opened: Cell<u32>,
}

impl RestLocationNavigator for Rc<NavRecorder> {
    fn open_nearest_rest_stop(&self) {
        self.opened.set(self.opened.get() + 1);
    }
}

fn started_engine() -> (DetectionEngine, Rc<Recorder>, Rc<NavRecorder>) {
    let recorder = Rc::new(Recorder::default());
    let navigator = Rc::new(NavRecorder::default());
    let mut engine = DetectionEngine::with_config(
        VigilConfig::default(),
        Box::new(Rc::clone(&recorder)),
        Box::new(Rc::clone(&navigator)),
    );
    engine.start_detection();
    (engine, recorder, navigator)
}

fn frame(ts_ms: i64) -> FrameInput {
    FrameInput {
        ts_ms,
        face_detected: true,
        events: vec![],
        mouth_open_ratio: Some(0.25),
        fatigue_detected: false,
    }
}

fn frame_with(ts_ms: i64, events: Vec<FatigueEvent>, fatigue_detected: bool) -> FrameInput {
    FrameInput {
        ts_ms,
        face_detected: true,
        events,
        mouth_open_ratio: Some(0.25),
        fatigue_detected,
    }
}

fn no_face_frame(ts_ms: i64) -> FrameInput {
    FrameInput {
        ts_ms,
        face_detected: false,
        events: vec![],
        mouth_open_ratio: None,
        fatigue_detected: false,
    }
}

#[test]
fn sustained_mouth_opening_scores_one_yawn() {
    let (mut engine, recorder, _nav) = started_engine();

    // Settle the adaptive baseline at resting level.
    for ts in (0..=3_000).step_by(100) {
        engine.process_frame(&frame(ts));
    }
    assert_eq!(engine.score(), 0);

    // Sustained wide opening: the smoothed ratio crosses the adaptive
    // threshold on the first high frame and must hold 700ms before firing.
    for ts in (3_050..=3_700).step_by(50) {
        let mut f = frame(ts);
        f.mouth_open_ratio = Some(0.80);
        engine.process_frame(&f);
    }
    assert_eq!(engine.yawn_count(), 0, "hold duration not yet satisfied");

    let mut f = frame(3_750);
    f.mouth_open_ratio = Some(0.80);
    engine.process_frame(&f);

    assert_eq!(engine.yawn_count(), 1);
    assert_eq!(engine.score(), 10);
    assert_eq!(engine.state(), OperatingState::Detecting);

    // Still inside the detector cooldown and latch: no second count.
    for ts in (3_800..=5_000).step_by(50) {
        let mut f = frame(ts);
        f.mouth_open_ratio = Some(0.80);
        engine.process_frame(&f);
    }
    assert_eq!(engine.yawn_count(), 1);
    // Post-yawn hold freezes recovery.
    assert_eq!(engine.score(), 10);
    assert_eq!(recorder.last_score(), Some((10, FatigueLevel::Normal)));
}

#[test]
fn externally_reported_yawn_event_is_scored() {
    let (mut engine, _recorder, _nav) = started_engine();
    engine.process_frame(&frame_with(0, vec![FatigueEvent::Yawn], false));
    assert_eq!(engine.score(), 10);
    assert_eq!(engine.yawn_count(), 1);
}

#[test]
fn recovery_rate_is_exact_at_frame_cadence() {
    let (mut engine, _recorder, _nav) = started_engine();

    engine.process_frame(&frame(0));
    engine.process_frame(&frame_with(1_000, vec![FatigueEvent::EyeClosure], true));
    assert_eq!(engine.score(), 70);
    assert_eq!(engine.state(), OperatingState::Warning);

    // Recovery anchored at the first frame; whole 1500ms periods step
    // the score down one point each, with sub-period remainders carried.
    engine.process_frame(&frame_with(2_000, vec![], true));
    assert_eq!(engine.score(), 69);
    engine.process_frame(&frame_with(3_000, vec![], true));
    assert_eq!(engine.score(), 68);
    engine.process_frame(&frame_with(4_000, vec![], true));
    assert_eq!(engine.score(), 68, "1000ms into the next period");
    engine.process_frame(&frame_with(5_000, vec![], true));
    assert_eq!(engine.score(), 67, "carry keeps the exact rate");
    assert_eq!(engine.level(), FatigueLevel::Warning);
    assert_eq!(engine.state(), OperatingState::Warning);
}

#[test]
fn acknowledgment_opens_cooldown_and_suppresses_alerts() {
    let (mut engine, recorder, _nav) = started_engine();

    engine.process_frame(&frame(0));
    engine.process_frame(&frame_with(1_000, vec![FatigueEvent::EyeClosure], true));
    assert_eq!(engine.state(), OperatingState::Warning);
    assert_eq!(recorder.count(&Note::Warning), 1);
    assert_eq!(recorder.count(&Note::Dialog(true)), 1);

    engine.acknowledge_warning(1_500);
    assert_eq!(engine.state(), OperatingState::Detecting);
    assert_eq!(recorder.count(&Note::Acknowledged), 1);
    assert_eq!(recorder.count(&Note::Dialog(false)), 1, "one false total");
    assert!(engine.is_in_cooldown(1_600));

    // Score is still in Warning territory but the cooldown keeps the
    // machine in plain detection, recovering at the fast rate.
    engine.process_frame(&frame_with(2_000, vec![], true));
    assert_eq!(engine.state(), OperatingState::Detecting);
    assert_eq!(engine.score(), 70, "first cooldown tick only anchors");
    engine.process_frame(&frame_with(3_000, vec![], true));
    assert_eq!(engine.score(), 67);
    engine.process_frame(&frame_with(4_000, vec![], true));
    assert_eq!(engine.score(), 64);
    assert_eq!(recorder.count(&Note::Warning), 1, "no re-entry in cooldown");

    // Cooldown over at 9500; a fatigue frame alerts again.
    engine.process_frame(&frame_with(9_600, vec![FatigueEvent::EyeClosure], true));
    assert_eq!(engine.state(), OperatingState::Warning);
    assert_eq!(recorder.count(&Note::Warning), 2);
}

#[test]
fn throttle_drops_frames_inside_interval() {
    let (mut engine, recorder, _nav) = started_engine();

    engine.process_frame(&frame(0));
    engine.process_frame(&frame(10));
    engine.process_frame(&frame(20));
    assert_eq!(recorder.score_updates(), 1, "only the first frame scored");

    engine.process_frame(&frame(50));
    assert_eq!(recorder.score_updates(), 2);
}

#[test]
fn processing_rate_setter_widens_the_gate() {
    let (mut engine, recorder, _nav) = started_engine();
    engine.set_processing_rate_fps(10); // 100ms interval

    engine.process_frame(&frame(0));
    engine.process_frame(&frame(60));
    assert_eq!(recorder.score_updates(), 1);
    engine.process_frame(&frame(100));
    assert_eq!(recorder.score_updates(), 2);
}

#[test]
fn no_face_debounce_and_restore() {
    let (mut engine, recorder, _nav) = started_engine();

    // Reach Notice via externally reported yawns.
    let mut ts = 0;
    for _ in 0..4 {
        engine.process_frame(&frame_with(ts, vec![FatigueEvent::Yawn], true));
        ts += 100;
    }
    assert_eq!(engine.score(), 40);
    assert_eq!(engine.state(), OperatingState::Notice);

    // Four missing-face frames: still debouncing.
    for _ in 0..4 {
        engine.process_frame(&no_face_frame(ts));
        ts += 100;
    }
    assert_eq!(engine.state(), OperatingState::Notice);
    assert_eq!(recorder.count(&Note::NoFace), 0);

    // Fifth consecutive frame trips the threshold.
    engine.process_frame(&no_face_frame(ts));
    ts += 100;
    assert_eq!(engine.state(), OperatingState::NoFace);
    assert_eq!(recorder.count(&Note::NoFace), 1);
    assert!(!engine.is_face_detected());

    // A single recovered face restores the interrupted state.
    engine.process_frame(&frame_with(ts, vec![], true));
    assert_eq!(engine.state(), OperatingState::Notice);
    assert!(engine.is_face_detected());
}

#[test]
fn intermittent_face_loss_never_alerts() {
    let (mut engine, recorder, _nav) = started_engine();

    // Alternate 3 missing, 1 present: the counter resets every time.
    let mut ts = 0;
    for _ in 0..10 {
        for _ in 0..3 {
            engine.process_frame(&no_face_frame(ts));
            ts += 100;
        }
        engine.process_frame(&frame(ts));
        ts += 100;
    }
    assert_eq!(recorder.count(&Note::NoFace), 0);
    assert_eq!(engine.state(), OperatingState::Detecting);
}

#[test]
fn repeated_detecting_frames_notify_entry_once() {
    let (mut engine, recorder, _nav) = started_engine();
    for ts in (0..1_000).step_by(100) {
        engine.process_frame(&frame(ts));
    }
    // One entry from start_detection, none from re-entries.
    assert_eq!(recorder.count(&Note::Normal), 1);
}

#[test]
fn excessive_blinking_applies_the_blink_penalty() {
    let (mut engine, recorder, _nav) = started_engine();

    let mut ts = 0;
    for _ in 0..25 {
        engine.process_frame(&frame_with(ts, vec![FatigueEvent::Blink], false));
        ts += 100;
    }
    assert_eq!(engine.score(), 0, "at the threshold, not above it");

    engine.process_frame(&frame_with(ts, vec![FatigueEvent::Blink], false));
    assert_eq!(engine.score(), 10);
    assert_eq!(engine.blink_count(), 26);
    assert_eq!(recorder.count(&Note::Blink), 26);
}

#[test]
fn eye_closure_takes_priority_over_other_events() {
    let (mut engine, _recorder, _nav) = started_engine();
    engine.process_frame(&frame_with(
        0,
        vec![FatigueEvent::EyeClosure, FatigueEvent::Yawn],
        true,
    ));
    // Floor only, not floor + yawn penalty.
    assert_eq!(engine.score(), 70);
}

#[test]
fn eye_closure_duration_tracks_the_open_interval() {
    let (mut engine, _recorder, _nav) = started_engine();
    let mut ts = 0;
    for _ in 0..6 {
        engine.process_frame(&frame_with(ts, vec![FatigueEvent::EyeClosure], true));
        ts += 100;
    }
    assert_eq!(engine.eye_closure_duration_ms(), 500);

    engine.process_frame(&frame_with(ts, vec![], true));
    assert_eq!(engine.eye_closure_duration_ms(), 0);
}

#[test]
fn invalid_ratio_aborts_the_frame_and_parks_in_error() {
    let (mut engine, recorder, _nav) = started_engine();
    engine.process_frame(&frame(0));

    let mut bad = frame(100);
    bad.mouth_open_ratio = Some(f32::NAN);
    engine.process_frame(&bad);

    assert_eq!(engine.state(), OperatingState::Error);
    assert_eq!(recorder.count(&Note::Error), 1);
    assert!(matches!(
        engine.last_error(),
        Some(FrameError::NonFiniteRatio(_))
    ));
    assert_eq!(engine.score(), 0, "faulty frame left no partial mutation");

    // Error is terminal for frames.
    let updates = recorder.score_updates();
    engine.process_frame(&frame(200));
    engine.process_frame(&frame(300));
    assert_eq!(recorder.score_updates(), updates);

    // Explicit reset is the way out.
    engine.reset_session();
    assert_eq!(engine.state(), OperatingState::Detecting);
    assert!(engine.last_error().is_none());
    engine.process_frame(&frame(400));
    assert_eq!(recorder.score_updates(), updates + 1);
}

#[test]
fn negative_ratio_is_a_frame_fault() {
    let (mut engine, _recorder, _nav) = started_engine();
    let mut bad = frame(0);
    bad.mouth_open_ratio = Some(-0.1);
    engine.process_frame(&bad);
    assert_eq!(engine.state(), OperatingState::Error);
    assert!(matches!(
        engine.last_error(),
        Some(FrameError::NegativeRatio(_))
    ));
}

#[test]
fn calibration_gates_scoring_and_forwards_progress() {
    let (mut engine, recorder, _nav) = started_engine();

    engine.start_calibration();
    assert_eq!(engine.state(), OperatingState::Calibrating);
    assert!(engine.is_calibrating());
    assert_eq!(recorder.count(&Note::CalibrationStarted), 1);

    // Frames during calibration reach neither the detector nor the score.
    for ts in (0..1_000).step_by(100) {
        engine.process_frame(&frame_with(ts, vec![FatigueEvent::Yawn], true));
    }
    assert_eq!(engine.score(), 0);
    assert_eq!(engine.yawn_count(), 0);
    assert_eq!(recorder.score_updates(), 0);

    engine.calibration_progress(50, 0.21);
    assert_eq!(recorder.count(&Note::CalibrationProgress(50)), 1);
    assert_eq!(engine.calibration_percent(), 50);

    engine.calibration_completed(CalibrationSummary {
        new_threshold: 0.19,
        min_ear: 0.08,
        max_ear: 0.31,
        avg_ear: 0.22,
    });
    assert_eq!(engine.state(), OperatingState::Detecting);
    assert_eq!(recorder.count(&Note::CalibrationCompleted), 1);
    assert_eq!(engine.calibration_percent(), 50, "queryable after completion");

    // A fresh calibration run starts from zero.
    engine.start_calibration();
    assert_eq!(engine.calibration_percent(), 0);
}

#[test]
fn shutdown_is_terminal_for_frames() {
    let (mut engine, recorder, _nav) = started_engine();
    engine.process_frame(&frame(0));

    engine.stop_detection();
    assert_eq!(engine.state(), OperatingState::Shutdown);
    assert_eq!(recorder.count(&Note::Shutdown), 1);

    let updates = recorder.score_updates();
    engine.process_frame(&frame(100));
    assert_eq!(recorder.score_updates(), updates);
}

#[test]
fn rest_request_hands_off_to_the_navigator() {
    let (mut engine, recorder, nav) = started_engine();
    engine.process_frame(&frame_with(0, vec![FatigueEvent::EyeClosure], true));
    assert_eq!(engine.state(), OperatingState::Warning);

    engine.request_rest();
    assert_eq!(engine.state(), OperatingState::RestMode);
    assert_eq!(nav.opened.get(), 1);
    assert_eq!(recorder.count(&Note::RequestedRest), 1);
    assert_eq!(recorder.count(&Note::Rest), 1);
    assert_eq!(recorder.count(&Note::Dialog(false)), 1);
}

#[test]
fn start_detection_resets_session_state() {
    let (mut engine, _recorder, _nav) = started_engine();
    engine.process_frame(&frame_with(0, vec![FatigueEvent::Yawn], true));
    engine.process_frame(&frame_with(100, vec![FatigueEvent::Blink], false));
    assert!(engine.score() > 0);

    engine.start_detection();
    assert_eq!(engine.score(), 0);
    assert_eq!(engine.yawn_count(), 0);
    assert_eq!(engine.blink_count(), 0);
    assert_eq!(engine.state(), OperatingState::Detecting);
}

#[test]
fn recent_counters_use_the_trailing_window() {
    let (mut engine, _recorder, _nav) = started_engine();
    engine.process_frame(&frame_with(0, vec![FatigueEvent::Yawn], false));
    engine.process_frame(&frame_with(30_000, vec![FatigueEvent::Yawn], false));

    assert_eq!(engine.yawn_count(), 2);
    assert_eq!(engine.recent_yawn_count(60_000, 30_000), 2);
    assert_eq!(engine.recent_yawn_count(60_000, 70_000), 1);
    assert_eq!(engine.recent_yawn_count(60_000, 120_000), 0);
}
