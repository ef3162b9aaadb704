// src/posture.rs - Forward-head ("text neck") and shoulder-tilt classification
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::geometry::{self, Point, Slope};
use crate::pose::{lookup_with_floor, DetectionFrame, Joint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    #[default]
    Snapshot,
    #[serde(alias = "skeleton")]
    Auto,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Snapshot => write!(f, "snapshot"),
            OperatingMode::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot" => Ok(OperatingMode::Snapshot),
            "auto" | "skeleton" => Ok(OperatingMode::Auto),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Classification<T> {
    Determined(T),
    Indeterminate,
}

impl<T> Classification<T> {
    pub fn is_determined(&self) -> bool {
        matches!(self, Classification::Determined(_))
    }

    pub fn determined(self) -> Option<T> {
        match self {
            Classification::Determined(value) => Some(value),
            Classification::Indeterminate => None,
        }
    }
}

impl<T> From<Option<T>> for Classification<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Classification::Determined(v),
            None => Classification::Indeterminate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoulderTilt {
    Level,
    LeftRaised,
    RightRaised,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    pub text_neck_distance_ratio: f64,
    pub slope_tolerance_ratio: f64,
    pub shoulder_diff_threshold_px: f64,
    pub confidence_floor: f64,
    pub nose_cross_check: bool,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ClassifierThresholds {
    fn from(config: &EngineConfig) -> Self {
        Self {
            text_neck_distance_ratio: config.text_neck_distance_ratio,
            slope_tolerance_ratio: config.slope_tolerance_ratio,
            shoulder_diff_threshold_px: config.shoulder_diff_threshold_px,
            confidence_floor: config.classifier_confidence_floor,
            nose_cross_check: config.nose_cross_check,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UpperBody {
    left_ear: Point,
    right_ear: Point,
    left_shoulder: Point,
    right_shoulder: Point,
}

impl UpperBody {
    fn from_frames(frames: &[DetectionFrame], floor: f64) -> Option<Self> {
        Some(Self {
            left_ear: lookup_with_floor(frames, Joint::LeftEar, floor)?,
            right_ear: lookup_with_floor(frames, Joint::RightEar, floor)?,
            left_shoulder: lookup_with_floor(frames, Joint::LeftShoulder, floor)?,
            right_shoulder: lookup_with_floor(frames, Joint::RightShoulder, floor)?,
        })
    }

    fn ear_midpoint(&self) -> Point {
        geometry::midpoint(&self.left_ear, &self.right_ear)
    }

    fn shoulder_midpoint(&self) -> Point {
        geometry::midpoint(&self.left_shoulder, &self.right_shoulder)
    }

    fn head_height(&self) -> Option<f64> {
        geometry::distance_point_to_line(&self.left_shoulder, &self.right_shoulder, &self.ear_midpoint())
    }

    fn ear_span(&self) -> f64 {
        geometry::distance(&self.left_ear, &self.right_ear)
    }
}

// Snapshot: the head sits lower over the shoulder line than in the
// reference *and* the ears appear further apart (the face moved toward the
// camera). Auto: the ear midpoint lies past the shoulder midpoint on x.
pub fn classify_forward_head(
    reference: &[DetectionFrame],
    live: &[DetectionFrame],
    mode: OperatingMode,
    thresholds: &ClassifierThresholds,
) -> Classification<bool> {
    let floor = thresholds.confidence_floor;
    let Some(refer) = UpperBody::from_frames(reference, floor) else {
        return Classification::Indeterminate;
    };
    let Some(current) = UpperBody::from_frames(live, floor) else {
        return Classification::Indeterminate;
    };

    match mode {
        OperatingMode::Snapshot => {
            if lookup_with_floor(live, Joint::Nose, floor).is_none() {
                return Classification::Indeterminate;
            }
            let (Some(refer_height), Some(current_height)) = (refer.head_height(), current.head_height()) else {
                return Classification::Indeterminate;
            };

            let dropped = refer_height * thresholds.text_neck_distance_ratio > current_height;
            let widened = refer.ear_span() < current.ear_span();
            Classification::Determined(dropped && widened)
        }
        OperatingMode::Auto => {
            let ear_mid = current.ear_midpoint();
            let shoulder_mid = current.shoulder_midpoint();
            let ear_forward = ear_mid.x > shoulder_mid.x;

            if !thresholds.nose_cross_check {
                return Classification::Determined(ear_forward);
            }

            // Opt-in: also require the nose to have dropped toward the shoulders.
            let Some(nose) = lookup_with_floor(live, Joint::Nose, floor) else {
                return Classification::Indeterminate;
            };
            let nose_closer =
                geometry::distance(&nose, &shoulder_mid) < geometry::distance(&ear_mid, &shoulder_mid);
            Classification::Determined(ear_forward && nose_closer)
        }
    }
}

pub fn classify_shoulder_tilt(
    reference: &[DetectionFrame],
    live: &[DetectionFrame],
    mode: OperatingMode,
    thresholds: &ClassifierThresholds,
) -> Classification<ShoulderTilt> {
    let floor = thresholds.confidence_floor;
    let shoulders = |frames: &[DetectionFrame]| -> Option<(Point, Point)> {
        Some((
            lookup_with_floor(frames, Joint::LeftShoulder, floor)?,
            lookup_with_floor(frames, Joint::RightShoulder, floor)?,
        ))
    };

    let Some((live_left, live_right)) = shoulders(live) else {
        return Classification::Indeterminate;
    };

    match mode {
        OperatingMode::Auto => {
            // y grows downward, so a positive offset means the left shoulder sits lower
            let diff = live_left.y - live_right.y;
            let tilt = if diff.abs() < thresholds.shoulder_diff_threshold_px {
                ShoulderTilt::Level
            } else if diff > 0.0 {
                ShoulderTilt::RightRaised
            } else {
                ShoulderTilt::LeftRaised
            };
            Classification::Determined(tilt)
        }
        OperatingMode::Snapshot => {
            let Some((ref_left, ref_right)) = shoulders(reference) else {
                return Classification::Indeterminate;
            };
            let (Slope::Finite(refer_slope), Slope::Finite(live_slope)) = (
                geometry::slope(&ref_left, &ref_right),
                geometry::slope(&live_left, &live_right),
            ) else {
                return Classification::Indeterminate;
            };

            let tolerance = refer_slope.abs() * thresholds.slope_tolerance_ratio;
            let tilt = if (refer_slope - live_slope).abs() <= tolerance {
                ShoulderTilt::Level
            } else if refer_slope < live_slope {
                ShoulderTilt::LeftRaised
            } else {
                ShoulderTilt::RightRaised
            };
            Classification::Determined(tilt)
        }
    }
}
