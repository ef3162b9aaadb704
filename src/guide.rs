// src/guide.rs - Calibration silhouette overlay: transform and containment of the upper-body joints
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::geometry::{self, Point};
use crate::pose::{lookup_with_floor, DetectionFrame, Joint};

// Head-and-shoulders template in a 640x480 design space, authored
// upside-down (y grows upward) relative to the rendering surface.
const CANONICAL_SILHOUETTE: [(f64, f64); 23] = [
    (320.0, 420.0),
    (360.0, 414.0),
    (390.0, 390.0),
    (405.0, 350.0),
    (405.0, 310.0),
    (390.0, 275.0),
    (360.0, 245.0),
    (360.0, 225.0),
    (470.0, 195.0),
    (530.0, 160.0),
    (560.0, 80.0),
    (580.0, 0.0),
    (60.0, 0.0),
    (80.0, 80.0),
    (110.0, 160.0),
    (170.0, 195.0),
    (280.0, 225.0),
    (280.0, 245.0),
    (250.0, 275.0),
    (235.0, 310.0),
    (235.0, 350.0),
    (250.0, 390.0),
    (280.0, 414.0),
];

pub const CALIBRATION_JOINTS: [Joint; 4] = [Joint::LeftShoulder, Joint::RightShoulder, Joint::LeftEar, Joint::RightEar];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideTransform {
    pub dx: f64,
    pub dy: f64,
    pub scale: f64,
}

impl Default for GuideTransform {
    fn default() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            scale: 1.0,
        }
    }
}

impl GuideTransform {
    pub fn new(dx: f64, dy: f64, scale: f64) -> Self {
        Self { dx, dy, scale }
    }

    // Control-panel sliders: offsets in [-100, 100] px, size in [0, 100]
    // where 50 is the authored size.
    pub fn from_sliders(horizontal: i32, vertical: i32, size: i32) -> Self {
        Self {
            dx: f64::from(horizontal.clamp(-100, 100)),
            dy: f64::from(vertical.clamp(-100, 100)),
            scale: f64::from(size.clamp(0, 100)) / 100.0 * 2.0,
        }
    }

    fn translates(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0
    }

    fn scales(&self) -> bool {
        self.scale != 0.0 && self.scale != 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidePolygon {
    points: Vec<Point>,
}

impl GuidePolygon {
    pub fn canonical() -> Self {
        Self::new(CANONICAL_SILHOUETTE.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn path(&self, transform: &GuideTransform, width: f64, height: f64) -> Vec<Point> {
        let mid_y = height / 2.0;
        let (anchor_x, anchor_y) = (width / 2.0, height);

        let mut path: Vec<Point> = self
            .points
            .iter()
            .map(|p| {
                let mut q = geometry::reflect_across_horizontal(p, mid_y);
                if transform.translates() {
                    q = geometry::translate(&q, transform.dx, transform.dy);
                }
                if transform.scales() {
                    q = geometry::scale_about_origin(&q, anchor_x, anchor_y, transform.scale);
                }
                q
            })
            .collect();

        if let Some(first) = path.first().copied() {
            path.push(first);
        }
        path
    }
}

impl Default for GuidePolygon {
    fn default() -> Self {
        Self::canonical()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuideConfig {
    pub polygon: GuidePolygon,
    pub transform: GuideTransform,
    pub surface_width: f64,
    pub surface_height: f64,
    pub confidence_floor: f64,
}

impl GuideConfig {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            polygon: GuidePolygon::canonical(),
            transform: GuideTransform::default(),
            surface_width: config.surface_width,
            surface_height: config.surface_height,
            confidence_floor: config.calibration_confidence_floor,
        }
    }

    pub fn path(&self) -> Vec<Point> {
        self.polygon.path(&self.transform, self.surface_width, self.surface_height)
    }

    pub fn area(&self) -> Option<f64> {
        geometry::polygon_area(&self.path())
    }

    pub fn evaluate(&self, live: &[DetectionFrame]) -> CalibrationCheck {
        let path = self.path();
        let mut check = CalibrationCheck::default();

        for joint in CALIBRATION_JOINTS {
            match lookup_with_floor(live, joint, self.confidence_floor) {
                None => check.missing.push(joint),
                Some(p) if !geometry::polygon_contains(&path, &p) => check.outside.push(joint),
                Some(_) => {}
            }
        }

        check.ready = check.missing.is_empty() && check.outside.is_empty();
        if !check.ready {
            debug!("Calibration not ready: missing {:?}, outside {:?}", check.missing, check.outside);
        }
        check
    }
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalibrationCheck {
    pub ready: bool,
    pub missing: Vec<Joint>,
    pub outside: Vec<Joint>,
}

pub fn evaluate_calibration(live: &[DetectionFrame], guide: &GuideConfig) -> bool {
    guide.evaluate(live).ready
}
