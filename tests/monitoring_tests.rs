use std::sync::Arc;
use std::time::Duration;

use posture_sentinel::notify::RecordingNotifier;
use posture_sentinel::{
    AlertPhase, Classification, DetectionFrame, EngineConfig, Joint, ManualClock, ManualScheduler,
    NotificationPermission, OperatingMode, PostureEngine, ShoulderTilt,
};

struct Session {
    engine: PostureEngine,
    scheduler: ManualScheduler,
    notifier: Arc<RecordingNotifier>,
}

impl Session {
    fn new(permission: NotificationPermission) -> Self {
        let clock = ManualClock::new();
        let scheduler = ManualScheduler::new(clock.clone());
        let notifier = Arc::new(RecordingNotifier::new(permission));
        let engine = PostureEngine::new(
            EngineConfig::default(),
            Arc::new(clock),
            Box::new(scheduler.clone()),
            notifier.clone(),
        )
        .expect("default config is valid");
        Self {
            engine,
            scheduler,
            notifier,
        }
    }

    /// Feed `frames` every 100ms for `ms` milliseconds.
    fn hold(&mut self, frames: &[DetectionFrame], ms: u64) -> AlertPhase {
        let mut phase = self.engine.alert_phase();
        for _ in 0..ms / 100 {
            self.scheduler.advance(Duration::from_millis(100));
            phase = self.engine.on_frame(frames.to_vec()).alert;
        }
        phase
    }

    fn elapsed_ms(&self) -> u128 {
        self.scheduler.clock().elapsed().as_millis()
    }
}

fn pose(nose: (f64, f64), ears: [(f64, f64); 2], shoulders: [(f64, f64); 2]) -> Vec<DetectionFrame> {
    vec![DetectionFrame::from_points(&[
        (Joint::Nose, nose.0, nose.1),
        (Joint::LeftEar, ears[0].0, ears[0].1),
        (Joint::RightEar, ears[1].0, ears[1].1),
        (Joint::LeftShoulder, shoulders[0].0, shoulders[0].1),
        (Joint::RightShoulder, shoulders[1].0, shoulders[1].1),
    ])]
}

fn upright() -> Vec<DetectionFrame> {
    pose((320.0, 170.0), [(360.0, 150.0), (280.0, 150.0)], [(440.0, 330.0), (200.0, 330.0)])
}

/// Head lower over the shoulders and closer to the camera.
fn slouched() -> Vec<DetectionFrame> {
    pose((320.0, 190.0), [(370.0, 170.0), (270.0, 170.0)], [(440.0, 330.0), (200.0, 330.0)])
}

/// Ear midpoint past the shoulder midpoint.
fn leaning() -> Vec<DetectionFrame> {
    pose((350.0, 170.0), [(390.0, 150.0), (310.0, 150.0)], [(440.0, 330.0), (200.0, 330.0)])
}

#[test]
fn test_sustained_forward_head_alert_timeline() {
    let mut s = Session::new(NotificationPermission::Granted);
    let session = s.engine.capture_reference(upright()).expect("user is framed");

    assert_eq!(s.engine.on_frame(slouched()).alert, AlertPhase::Sustained);

    assert_eq!(s.hold(&slouched(), 2900), AlertPhase::Sustained);
    assert_eq!(s.scheduler.active_tasks(), 0);

    assert_eq!(s.hold(&slouched(), 100), AlertPhase::Alerting);
    assert_eq!(s.elapsed_ms(), 3000);
    assert_eq!(s.scheduler.active_tasks(), 1);
    assert!(s.notifier.shown().is_empty());

    assert_eq!(s.hold(&slouched(), 4000), AlertPhase::Alerting);
    assert_eq!(s.scheduler.active_tasks(), 1);

    // fired at 5000ms and 7000ms
    let shown = s.notifier.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].firing, 1);
    assert_eq!(shown[1].firing, 2);
    assert!(shown.iter().all(|alert| alert.session == session));
    assert_eq!(s.notifier.follow_ups(), 2);
}

#[test]
fn test_correction_before_first_firing_cancels_alert() {
    let mut s = Session::new(NotificationPermission::Granted);
    s.engine.capture_reference(upright()).unwrap();
    s.engine.on_frame(slouched());

    assert_eq!(s.hold(&slouched(), 3000), AlertPhase::Alerting);
    assert_eq!(s.hold(&slouched(), 400), AlertPhase::Alerting);
    assert_eq!(s.hold(&upright(), 100), AlertPhase::Armed);
    assert_eq!(s.elapsed_ms(), 3500);

    s.hold(&upright(), 10_000);
    assert!(s.notifier.shown().is_empty());
    assert_eq!(s.scheduler.active_tasks(), 0);
    assert_eq!(s.scheduler.firings(), 0);
}

#[test]
fn test_lost_detection_counts_as_corrected() {
    let mut s = Session::new(NotificationPermission::Granted);
    s.engine.capture_reference(upright()).unwrap();
    s.engine.on_frame(slouched());
    s.hold(&slouched(), 3000);

    let report = s.engine.on_frame(Vec::new());
    assert_eq!(report.forward_head, Classification::Indeterminate);
    assert_eq!(report.alert, AlertPhase::Armed);
    // status keeps the last verdict while the user is out of frame
    assert_eq!(report.status.forward_head, Some(true));
    assert_eq!(s.scheduler.active_tasks(), 0);
}

#[test]
fn test_denied_permission_still_follows_up() {
    let mut s = Session::new(NotificationPermission::Denied);
    s.engine.capture_reference(upright()).unwrap();
    s.engine.on_frame(slouched());
    s.hold(&slouched(), 5000);

    assert!(s.notifier.shown().is_empty());
    assert_eq!(s.notifier.follow_ups(), 1);
}

#[test]
fn test_auto_mode_alerts_on_lean() {
    let mut s = Session::new(NotificationPermission::Granted);
    s.engine.set_mode(OperatingMode::Auto);
    s.engine.capture_reference(upright()).unwrap();

    let report = s.engine.on_frame(upright());
    assert_eq!(report.forward_head, Classification::Determined(false));
    assert_eq!(report.shoulder_tilt, Classification::Determined(ShoulderTilt::Level));

    s.engine.on_frame(leaning());
    assert_eq!(s.hold(&leaning(), 5000), AlertPhase::Alerting);
    assert_eq!(s.notifier.shown().len(), 1);
}

#[test]
fn test_capture_requires_calibration_in_snapshot_only() {
    let off_guide = pose((40.0, 170.0), [(60.0, 150.0), (20.0, 150.0)], [(90.0, 330.0), (10.0, 330.0)]);

    let mut s = Session::new(NotificationPermission::Granted);
    assert!(s.engine.capture_reference(off_guide.clone()).is_err());
    assert!(s.engine.session().is_none());
    assert_eq!(s.engine.alert_phase(), AlertPhase::Idle);

    s.engine.set_mode(OperatingMode::Auto);
    assert!(s.engine.capture_reference(off_guide).is_ok());
    assert_eq!(s.engine.alert_phase(), AlertPhase::Armed);
}

#[test]
fn test_no_alerts_without_reference() {
    let mut s = Session::new(NotificationPermission::Granted);
    assert_eq!(s.hold(&slouched(), 10_000), AlertPhase::Idle);
    assert_eq!(s.scheduler.active_tasks(), 0);
    assert!(s.notifier.shown().is_empty());
}

#[test]
fn test_clear_and_mode_change_stop_alerts() {
    let mut s = Session::new(NotificationPermission::Granted);
    s.engine.capture_reference(upright()).unwrap();
    s.engine.on_frame(slouched());
    s.hold(&slouched(), 3000);
    assert_eq!(s.scheduler.active_tasks(), 1);

    s.engine.clear_reference();
    s.engine.clear_reference();
    assert_eq!(s.engine.alert_phase(), AlertPhase::Idle);
    assert_eq!(s.scheduler.active_tasks(), 0);

    s.engine.capture_reference(upright()).unwrap();
    s.engine.on_frame(slouched());
    s.hold(&slouched(), 3000);
    s.engine.set_mode(OperatingMode::Auto);
    s.engine.set_mode(OperatingMode::Auto);
    assert!(s.engine.session().is_none());
    assert_eq!(s.scheduler.active_tasks(), 0);

    s.hold(&slouched(), 10_000);
    assert!(s.notifier.shown().is_empty());
}

#[test]
fn test_frame_report_json() {
    let mut s = Session::new(NotificationPermission::Granted);
    let calibrating = serde_json::to_value(s.engine.on_frame(upright())).unwrap();
    assert_eq!(calibrating["calibration_ready"], true);
    assert_eq!(calibrating["forward_head"]["status"], "indeterminate");
    assert_eq!(calibrating["alert"], "idle");
    assert_eq!(calibrating["mode"], "snapshot");

    s.engine.capture_latest().unwrap();
    let report = serde_json::to_value(s.engine.on_frame(slouched())).unwrap();
    assert_eq!(report["forward_head"]["status"], "determined");
    assert_eq!(report["forward_head"]["value"], true);
    assert_eq!(report["status"]["forward_head"], true);
    assert_eq!(report["alert"], "sustained");
    assert!(report["calibration_ready"].is_null());
}

#[test]
fn test_detection_frame_wire_format() {
    let json = r#"[{
        "keypoints": [
            {"x": 360.0, "y": 150.0, "name": "left_ear", "score": 0.9},
            {"x": 280.0, "y": 150.0, "name": "right_ear", "score": 0.8}
        ],
        "score": 0.85
    }]"#;
    let frames: Vec<DetectionFrame> = serde_json::from_str(json).unwrap();
    assert_eq!(frames[0].keypoint(Joint::LeftEar).map(|k| k.x), Some(360.0));
    assert!(frames[0].keypoint(Joint::Nose).is_none());
}
