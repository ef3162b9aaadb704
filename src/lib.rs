// src/lib.rs - Posture analysis engine: pose geometry, classifiers, calibration guide, alert debounce
pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod guide;
pub mod notify;
pub mod pose;
pub mod posture;
pub mod scheduler;

pub use alert::{AlertDebouncer, AlertPhase};
pub use config::EngineConfig;
pub use engine::{FrameReport, MonitoringSession, PostureEngine, PostureStatus};
pub use error::{EngineError, Result};
pub use geometry::{Point, Slope};
pub use guide::{evaluate_calibration, GuideConfig, GuidePolygon, GuideTransform};
pub use notify::{LogNotifier, NotificationPermission, Notifier, PostureAlert};
pub use pose::{DetectionFrame, Joint, Keypoint};
pub use posture::{classify_forward_head, classify_shoulder_tilt, Classification, OperatingMode, ShoulderTilt};
pub use scheduler::{Clock, ManualClock, ManualScheduler, Scheduler, SystemClock, TokioScheduler};
