// src/config.rs - Tunable thresholds and overlay geometry, loadable from JSON
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub text_neck_distance_ratio: f64,
    pub slope_tolerance_ratio: f64,
    pub shoulder_diff_threshold_px: f64,
    pub alert_onset_ms: u64,
    pub alert_interval_ms: u64,
    pub follow_up_delay_ms: u64,
    // Overlay surface, also the guide silhouette's design space.
    pub surface_width: f64,
    pub surface_height: f64,
    pub calibration_confidence_floor: f64,
    pub classifier_confidence_floor: f64,
    pub require_calibration_for_snapshot: bool,
    // Auto mode: additionally require the nose to drop toward the shoulders.
    // Off until it has been validated on real sessions.
    pub nose_cross_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_neck_distance_ratio: 0.98,
            slope_tolerance_ratio: 0.9,
            shoulder_diff_threshold_px: 40.0,
            alert_onset_ms: 3000,
            alert_interval_ms: 2000,
            follow_up_delay_ms: 1000,
            surface_width: 640.0,
            surface_height: 480.0,
            calibration_confidence_floor: 0.25,
            classifier_confidence_floor: 0.0,
            require_calibration_for_snapshot: true,
            nose_cross_check: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "posture-sentinel").map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;

        if !(self.surface_width > 0.0 && self.surface_height > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "surface must be positive, got {}x{}",
                self.surface_width, self.surface_height
            )));
        }
        if self.alert_interval_ms == 0 {
            return Err(EngineError::InvalidConfig("alert_interval_ms must be nonzero".into()));
        }
        if !in_unit(self.text_neck_distance_ratio) {
            return Err(EngineError::InvalidConfig(format!(
                "text_neck_distance_ratio {} outside (0, 1]",
                self.text_neck_distance_ratio
            )));
        }
        if !in_unit(self.slope_tolerance_ratio) {
            return Err(EngineError::InvalidConfig(format!(
                "slope_tolerance_ratio {} outside (0, 1]",
                self.slope_tolerance_ratio
            )));
        }
        if !(self.shoulder_diff_threshold_px.is_finite() && self.shoulder_diff_threshold_px >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "shoulder_diff_threshold_px {} must be finite and not negative",
                self.shoulder_diff_threshold_px
            )));
        }
        for (name, floor) in [
            ("calibration_confidence_floor", self.calibration_confidence_floor),
            ("classifier_confidence_floor", self.classifier_confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&floor) {
                return Err(EngineError::InvalidConfig(format!("{} {} outside [0, 1]", name, floor)));
            }
        }
        Ok(())
    }

    pub fn alert_onset(&self) -> Duration {
        Duration::from_millis(self.alert_onset_ms)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.alert_interval_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms)
    }
}
