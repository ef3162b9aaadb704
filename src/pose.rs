// src/pose.rs - Detection frames from the pose model and named-joint lookup
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    // joints from other body models; kept so one stray name does not reject the frame
    #[serde(other)]
    Unknown,
}

impl Joint {
    pub const ALL: [Joint; 17] = [
        Joint::Nose,
        Joint::LeftEye,
        Joint::RightEye,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftEye => "left_eye",
            Joint::RightEye => "right_eye",
            Joint::LeftEar => "left_ear",
            Joint::RightEar => "right_ear",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
            Joint::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub name: Joint,
    // TF.js pose models call this `score`.
    #[serde(alias = "score")]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(name: Joint, x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, name, confidence }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub keypoints: Vec<Keypoint>,
    #[serde(rename = "box", default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub id: i64,
}

impl DetectionFrame {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        let score = if keypoints.is_empty() {
            0.0
        } else {
            keypoints.iter().map(|k| k.confidence).sum::<f64>() / keypoints.len() as f64
        };

        Self {
            keypoints,
            bounding_box: BoundingBox::default(),
            score,
            id: 0,
        }
    }

    pub fn from_points(points: &[(Joint, f64, f64)]) -> Self {
        Self::new(
            points
                .iter()
                .map(|&(joint, x, y)| Keypoint::new(joint, x, y, 1.0))
                .collect(),
        )
    }

    pub fn keypoint(&self, joint: Joint) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.name == joint)
    }
}

// A coordinate of exactly zero (or a non-finite one) counts as "not
// detected": nothing real sits on the frame edge in a desk-camera framing.
pub fn lookup(frames: &[DetectionFrame], joint: Joint) -> Option<Point> {
    lookup_with_floor(frames, joint, 0.0)
}

pub fn lookup_with_floor(frames: &[DetectionFrame], joint: Joint, min_confidence: f64) -> Option<Point> {
    let keypoint = frames.first()?.keypoint(joint)?;

    if keypoint.confidence < min_confidence {
        return None;
    }
    if !is_detected(keypoint.x) || !is_detected(keypoint.y) {
        return None;
    }

    Some(keypoint.point())
}

fn is_detected(coordinate: f64) -> bool {
    coordinate != 0.0 && coordinate.is_finite()
}
