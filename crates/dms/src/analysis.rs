//! DMS analysis results

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::overlay::Overlay;
use crate::state::{EyeClass, StabilizerState};
use crate::status::{Color, Status};

/// What was measured for one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    /// Face box in frame coordinates
    pub face: Rect,
    /// Eye boxes in frame coordinates
    pub eyes: Vec<Rect>,
    /// Mean eye openness, absent when no eyes were found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness: Option<f32>,
    /// Instantaneous classification fed to the stabilizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_class: Option<EyeClass>,
}

/// Complete per-frame result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameReport {
    /// Sequence number of the analyzed frame
    pub sequence: u32,
    pub status: Status,
    pub color: Color,
    /// Faces in the order they updated the stabilizer
    pub faces: Vec<FaceObservation>,
    /// Run lengths after this frame
    pub state: StabilizerState,
    pub overlay: Overlay,
}

impl FrameReport {
    pub fn face_detected(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Whether the driver needs attention
    pub fn is_alert(&self) -> bool {
        self.status.is_alert()
    }
}
