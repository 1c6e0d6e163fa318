//! DMS configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detector::DetectParams;
use crate::DmsError;

/// Openness cutoffs separating closed, half-closed and open eyes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeThresholds {
    /// Below this the eyes count as closed
    pub closed: f32,
    /// Below this (and at or above `closed`) the eyes count as half closed
    pub drowsy_max: f32,
}

impl Default for EyeThresholds {
    fn default() -> Self {
        Self {
            closed: 0.22,
            drowsy_max: 0.30,
        }
    }
}

/// Consecutive frames a classification must hold before it is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceLimits {
    pub sleep: u32,
    pub drowsy: u32,
    pub active: u32,
}

impl Default for DebounceLimits {
    fn default() -> Self {
        Self {
            sleep: 6,
            drowsy: 6,
            active: 6,
        }
    }
}

/// Which detected faces feed the shared stabilizer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacePolicy {
    /// Every face updates the counters in detection order; the last face wins
    #[default]
    EachInOrder,
    /// Only the largest face is analyzed
    LargestOnly,
}

/// Which detection backend `DmsModule::new` builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Haar cascades when built with OpenCV, otherwise the heuristic
    #[default]
    Auto,
    /// OpenCV Haar cascades (needs the `backend-opencv` feature)
    Cascade,
    /// Fixed face region gated on brightness and contrast, dark blobs as eyes
    Heuristic,
}

/// Detection backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Directory holding the cascade model files
    pub cascade_dir: PathBuf,
    pub face_cascade: String,
    pub eye_cascade: String,
    /// Heuristic face box as fractions of the frame: x, y, width, height
    pub face_region: [f32; 4],
    /// Mean gray level the face region needs before it counts as a face
    pub min_brightness: u8,
    /// Gray-level standard deviation the face region needs before it counts as a face
    pub min_contrast: f32,
    /// Gray level below which a pixel is treated as part of an eye
    pub dark_threshold: u8,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            cascade_dir: PathBuf::from("/usr/share/opencv4/haarcascades"),
            face_cascade: "haarcascade_frontalface_default.xml".into(),
            eye_cascade: "haarcascade_eye.xml".into(),
            face_region: [0.3, 0.2, 0.4, 0.5],
            min_brightness: 40,
            min_contrast: 12.0,
            dark_threshold: 60,
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    pub thresholds: EyeThresholds,
    pub limits: DebounceLimits,
    /// Face detector parameters
    pub face_detection: DetectParams,
    /// Eye detector parameters (applied to the upper half of each face)
    pub eye_detection: DetectParams,
    pub face_policy: FacePolicy,
    pub backend: BackendConfig,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            thresholds: EyeThresholds::default(),
            limits: DebounceLimits::default(),
            face_detection: DetectParams::faces(),
            eye_detection: DetectParams::eyes(),
            face_policy: FacePolicy::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl DmsConfig {
    /// Reject settings the stabilizer cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        let t = &self.thresholds;
        if !(t.closed >= 0.0 && t.closed < t.drowsy_max) {
            return Err(DmsError::Config(format!(
                "closed threshold {} must be non-negative and below drowsy threshold {}",
                t.closed, t.drowsy_max
            )));
        }

        let l = &self.limits;
        if l.sleep == 0 || l.drowsy == 0 || l.active == 0 {
            return Err(DmsError::Config("debounce limits must be at least 1".into()));
        }

        self.face_detection.validate("face_detection")?;
        self.eye_detection.validate("eye_detection")?;

        let [x, y, w, h] = self.backend.face_region;
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(x) && in_unit(y) && in_unit(w) && in_unit(h)) || x + w > 1.0 || y + h > 1.0 {
            return Err(DmsError::Config(format!(
                "face_region {:?} must lie within the unit square",
                self.backend.face_region
            )));
        }
        if !(self.backend.min_contrast >= 0.0) {
            return Err(DmsError::Config(format!(
                "min_contrast must be non-negative, got {}",
                self.backend.min_contrast
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DmsConfig::default();
        assert_eq!(config.thresholds.closed, 0.22);
        assert_eq!(config.thresholds.drowsy_max, 0.30);
        assert_eq!(config.limits, DebounceLimits { sleep: 6, drowsy: 6, active: 6 });
        assert_eq!(config.eye_detection.min_size, Some((20, 8)));
        assert_eq!(config.face_detection.min_size, None);
        assert_eq!(config.face_policy, FacePolicy::EachInOrder);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_defaults() {
        let backend = BackendConfig::default();
        assert_eq!(backend.kind, BackendKind::Auto);
        assert_eq!(
            backend.cascade_dir.join(&backend.face_cascade),
            PathBuf::from("/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml")
        );
        assert_eq!(backend.eye_cascade, "haarcascade_eye.xml");
    }

    #[test]
    fn test_negative_contrast_rejected() {
        let mut config = DmsConfig::default();
        config.backend.min_contrast = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = DmsConfig {
            thresholds: EyeThresholds {
                closed: 0.3,
                drowsy_max: 0.3,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = DmsConfig {
            limits: DebounceLimits {
                sleep: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_face_region_outside_frame_rejected() {
        let mut config = DmsConfig::default();
        config.backend.face_region = [0.8, 0.2, 0.4, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: DmsConfig = serde_json::from_str(
            r#"{"face_policy": "largest_only", "backend": {"kind": "heuristic"}}"#,
        )
        .unwrap();
        assert_eq!(config.face_policy, FacePolicy::LargestOnly);
        assert_eq!(config.limits.sleep, 6);
        assert_eq!(config.backend.kind, BackendKind::Heuristic);
        assert_eq!(config.backend.dark_threshold, 60);
    }
}
