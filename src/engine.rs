// src/engine.rs - Posture monitoring session: reference capture, per-frame classification, alert debounce
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alert::{AlertDebouncer, AlertPhase};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geometry::Point;
use crate::guide::{GuideConfig, GuideTransform};
use crate::notify::{self, Notifier, PostureAlert, FORWARD_HEAD_MESSAGE};
use crate::pose::DetectionFrame;
use crate::posture::{
    classify_forward_head, classify_shoulder_tilt, Classification, ClassifierThresholds, OperatingMode,
    ShoulderTilt,
};
use crate::scheduler::{Clock, RepeatingTask, Scheduler};

#[derive(Debug, Clone)]
pub struct MonitoringSession {
    pub id: Uuid,
    pub captured_at: DateTime<Local>,
    pub mode: OperatingMode,
    pub frames: Vec<DetectionFrame>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostureStatus {
    pub forward_head: Option<bool>,
    pub shoulder_tilt: Option<ShoulderTilt>,
}

impl PostureStatus {
    fn update(&mut self, forward_head: Classification<bool>, shoulder_tilt: Classification<ShoulderTilt>) {
        if let Some(value) = forward_head.determined() {
            self.forward_head = Some(value);
        }
        if let Some(value) = shoulder_tilt.determined() {
            self.shoulder_tilt = Some(value);
        }
    }

    pub fn forward_head_message(&self) -> &'static str {
        match self.forward_head {
            None => "Unable to determine posture",
            Some(true) => "Forward head posture detected",
            Some(false) => "Head posture looks good",
        }
    }

    pub fn shoulder_message(&self) -> &'static str {
        match self.shoulder_tilt {
            None => "Unable to determine posture",
            Some(ShoulderTilt::Level) => "Shoulders are level",
            Some(ShoulderTilt::LeftRaised) => "Left shoulder is raised",
            Some(ShoulderTilt::RightRaised) => "Right shoulder is raised",
        }
    }
}

impl fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Head: {} | Shoulders: {}", self.forward_head_message(), self.shoulder_message())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub timestamp: DateTime<Local>,
    pub mode: OperatingMode,
    pub session: Option<Uuid>,
    // Only evaluated while no reference pose is set.
    pub calibration_ready: Option<bool>,
    pub forward_head: Classification<bool>,
    pub shoulder_tilt: Classification<ShoulderTilt>,
    pub status: PostureStatus,
    pub alert: AlertPhase,
}

/// Owns all mutable monitoring state. Every mutation goes through `&mut self`,
/// so frames must be fed from a single consumer.
pub struct PostureEngine {
    config: EngineConfig,
    thresholds: ClassifierThresholds,
    guide: GuideConfig,
    mode: OperatingMode,
    session: Option<MonitoringSession>,
    latest: Option<Vec<DetectionFrame>>,
    calibration_ready: bool,
    status: PostureStatus,
    alert: AlertDebouncer,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn Scheduler>,
    notifier: Arc<dyn Notifier>,
}

impl PostureEngine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn Scheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            thresholds: ClassifierThresholds::from(&config),
            guide: GuideConfig::from_config(&config),
            alert: AlertDebouncer::new(config.alert_onset(), config.alert_interval()),
            mode: OperatingMode::default(),
            session: None,
            latest: None,
            calibration_ready: false,
            status: PostureStatus::default(),
            config,
            clock,
            scheduler,
            notifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn session(&self) -> Option<&MonitoringSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> PostureStatus {
        self.status
    }

    pub fn alert_phase(&self) -> AlertPhase {
        self.alert.phase()
    }

    pub fn calibration_ready(&self) -> bool {
        self.calibration_ready
    }

    pub fn guide_transform(&self) -> GuideTransform {
        self.guide.transform
    }

    pub fn guide_path(&self) -> Vec<Point> {
        self.guide.path()
    }

    pub fn on_frame(&mut self, frames: Vec<DetectionFrame>) -> FrameReport {
        let now = self.clock.now();

        let (forward_head, shoulder_tilt, calibration_ready) = match &self.session {
            None => {
                let ready = self.guide.evaluate(&frames).ready;
                if ready != self.calibration_ready {
                    info!("Calibration {}", if ready { "ready" } else { "lost" });
                }
                self.calibration_ready = ready;
                (Classification::Indeterminate, Classification::Indeterminate, Some(ready))
            }
            Some(session) => {
                let forward_head = classify_forward_head(&session.frames, &frames, self.mode, &self.thresholds);
                let shoulder_tilt = classify_shoulder_tilt(&session.frames, &frames, self.mode, &self.thresholds);
                (forward_head, shoulder_tilt, None)
            }
        };

        self.status.update(forward_head, shoulder_tilt);

        let session_id = self.session.as_ref().map(|s| s.id);
        let notifier = Arc::clone(&self.notifier);
        let alert = self.alert.observe(
            forward_head == Classification::Determined(true),
            now,
            self.scheduler.as_mut(),
            || alert_task(notifier, session_id.unwrap_or_default()),
        );

        self.latest = Some(frames);

        FrameReport {
            timestamp: Local::now(),
            mode: self.mode,
            session: session_id,
            calibration_ready,
            forward_head,
            shoulder_tilt,
            status: self.status,
            alert,
        }
    }

    /// Store `frames` as the reference pose and start monitoring.
    ///
    /// In snapshot mode the user must be framed inside the guide unless
    /// `require_calibration_for_snapshot` is off.
    pub fn capture_reference(&mut self, frames: Vec<DetectionFrame>) -> Result<Uuid> {
        if frames.is_empty() {
            return Err(EngineError::NoDetection);
        }
        if self.mode == OperatingMode::Snapshot
            && self.config.require_calibration_for_snapshot
            && !self.guide.evaluate(&frames).ready
        {
            warn!("Snapshot refused: align with the guide first");
            return Err(EngineError::NotCalibrated);
        }

        let session = MonitoringSession {
            id: Uuid::new_v4(),
            captured_at: Local::now(),
            mode: self.mode,
            frames,
        };
        let id = session.id;
        info!(session = %id, mode = %self.mode, "Reference pose captured");

        self.session = Some(session);
        self.status = PostureStatus::default();
        self.alert.arm(self.scheduler.as_mut());
        Ok(id)
    }

    pub fn capture_latest(&mut self) -> Result<Uuid> {
        let frames = self.latest.clone().ok_or(EngineError::NoDetection)?;
        self.capture_reference(frames)
    }

    pub fn clear_reference(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, "Reference pose cleared");
        }
        self.status = PostureStatus::default();
        self.calibration_ready = false;
        self.alert.disarm(self.scheduler.as_mut());
    }

    pub fn cancel_monitoring(&mut self) {
        self.clear_reference();
    }

    pub fn set_mode(&mut self, mode: OperatingMode) {
        if mode == self.mode {
            return;
        }
        info!("Operating mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.clear_reference();
    }

    pub fn set_guide_transform(&mut self, dx: f64, dy: f64, scale: f64) {
        self.guide.transform = GuideTransform::new(dx, dy, scale);
        debug!("Guide transform set to {:?}", self.guide.transform);
    }

    pub fn set_guide_sliders(&mut self, horizontal: i32, vertical: i32, size: i32) {
        self.guide.transform = GuideTransform::from_sliders(horizontal, vertical, size);
        debug!("Guide transform set to {:?}", self.guide.transform);
    }
}

impl Drop for PostureEngine {
    fn drop(&mut self) {
        self.alert.disarm(self.scheduler.as_mut());
    }
}

fn alert_task(notifier: Arc<dyn Notifier>, session: Uuid) -> RepeatingTask {
    let mut firing = 0u64;
    Box::new(move || {
        firing += 1;
        let alert = PostureAlert {
            session,
            firing,
            raised_at: Local::now(),
            message: FORWARD_HEAD_MESSAGE,
        };
        notify::deliver(notifier.as_ref(), &alert);
    })
}
