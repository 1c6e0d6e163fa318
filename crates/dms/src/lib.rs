//! Driver Monitoring System (DMS)
//!
//! Real-time drowsiness detection from a camera feed:
//! - Face and eye detection behind a pluggable detector
//! - Eye openness from eye box proportions
//! - Debounced Active / Drowsy / Sleeping status

pub mod analysis;
#[cfg(feature = "backend-opencv")]
pub mod cascade;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod openness;
pub mod overlay;
pub mod state;
pub mod stats;
pub mod status;

pub use analysis::{FaceObservation, FrameReport};
pub use config::{BackendConfig, BackendKind, DebounceLimits, DmsConfig, EyeThresholds, FacePolicy};
pub use detector::{DetectParams, FaceEyeDetector, ObjectDetector};
pub use geometry::Rect;
pub use state::{EyeClass, StabilizerState};
pub use stats::SessionStats;
pub use status::Status;

use camera_capture::frame::VideoFrame;
use image::imageops;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::openness::mean_openness;
use crate::overlay::{
    Overlay, EYE_BOX_COLOR, FACE_BOX_COLOR, RATIO_SCALE, STATUS_ORIGIN, STATUS_SCALE, TEXT_COLOR,
};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raised by detection backends
    #[error("Detection failed: {0}")]
    Detection(String),
}

/// Driver monitoring module
pub struct DmsModule {
    config: DmsConfig,
    detector: Box<dyn FaceEyeDetector>,
    state: StabilizerState,
    stats: SessionStats,
}

impl DmsModule {
    /// Create a new DMS module with the configured detection backend
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        let detector = detector::build_detector(&config)?;
        Self::with_detector(config, detector)
    }

    /// Create a DMS module around an external detector
    pub fn with_detector(
        config: DmsConfig,
        detector: Box<dyn FaceEyeDetector>,
    ) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            "DMS ready: closed < {}, drowsy < {}, limits {:?}, policy {:?}",
            config.thresholds.closed, config.thresholds.drowsy_max, config.limits, config.face_policy
        );
        Ok(Self {
            config,
            detector,
            state: StabilizerState::default(),
            stats: SessionStats::default(),
        })
    }

    /// Analyze a single frame for driver state
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<FrameReport, DmsError> {
        let gray = frame.to_grayscale();
        let detected = self.detector.detect_faces(&gray)?;
        let faces = self.select_faces(detected);

        let mut status = Status::NoFace;
        let mut overlay = Overlay::new();
        let mut observations = Vec::with_capacity(faces.len());

        for face in faces {
            overlay.push_rect(face, FACE_BOX_COLOR, 2);

            // Eyes are only searched for in the top half of the face
            let eyes = match face.upper_half().clamp_to(gray.width(), gray.height()) {
                Some(roi) => {
                    let region = imageops::crop_imm(
                        &gray,
                        roi.x as u32,
                        roi.y as u32,
                        roi.width,
                        roi.height,
                    )
                    .to_image();
                    self.detector
                        .detect_eyes(&region)?
                        .into_iter()
                        .map(|eye| eye.offset(roi.x, roi.y))
                        .collect()
                }
                None => {
                    debug!("Face {:?} has no visible upper half", face);
                    Vec::new()
                }
            };
            for eye in &eyes {
                overlay.push_rect(*eye, EYE_BOX_COLOR, 1);
            }

            let openness = mean_openness(&eyes);
            let eye_class = match openness {
                Some(ratio) => {
                    overlay.push_text(
                        format!("Ratio: {:.2}", ratio),
                        face.x,
                        face.y - 10,
                        RATIO_SCALE,
                        TEXT_COLOR,
                    );

                    let class = self.state.apply(ratio, &self.config.thresholds);
                    debug!(
                        "Frame {}: openness {:.3} -> {:?}, runs {:?}",
                        frame.sequence, ratio, class, self.state
                    );

                    if let Some(debounced) = self.state.debounced(&self.config.limits) {
                        status = debounced;
                    }
                    Some(class)
                }
                None => {
                    status = Status::EyesNotFound;
                    None
                }
            };

            observations.push(FaceObservation {
                face,
                eyes,
                openness,
                eye_class,
            });
        }

        let (x, y) = STATUS_ORIGIN;
        overlay.push_text(status.label(), x, y, STATUS_SCALE, status.color());

        let report = FrameReport {
            sequence: frame.sequence,
            status,
            color: status.color(),
            faces: observations,
            state: self.state,
            overlay,
        };

        if let Some(previous) = self.stats.record(&report) {
            if status == Status::Sleeping {
                warn!("Driver status changed: {} -> {}", previous, status);
            } else {
                info!("Driver status changed: {} -> {}", previous, status);
            }
        }

        Ok(report)
    }

    fn select_faces(&self, faces: Vec<Rect>) -> Vec<Rect> {
        match self.config.face_policy {
            FacePolicy::EachInOrder => faces,
            FacePolicy::LargestOnly => faces
                .into_iter()
                .reduce(|best, face| if face.area() > best.area() { face } else { best })
                .into_iter()
                .collect(),
        }
    }

    /// Current run lengths
    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset driver state (on driver change)
    pub fn reset_state(&mut self) {
        info!("Resetting driver state");
        self.state.reset();
        self.stats = SessionStats::default();
    }
}
