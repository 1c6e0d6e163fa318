//! Per-session counters

use serde::{Deserialize, Serialize};

use crate::analysis::FrameReport;
use crate::status::Status;

/// Frame and status counts since the module was created or reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames: u64,
    pub frames_with_face: u64,
    pub no_face: u64,
    pub eyes_not_found: u64,
    pub active: u64,
    pub drowsy: u64,
    pub sleeping: u64,
    /// Number of times the reported status changed
    pub transitions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<Status>,
}

impl SessionStats {
    /// Record one frame. Returns the previous status if this frame changed it.
    pub fn record(&mut self, report: &FrameReport) -> Option<Status> {
        self.frames += 1;
        if report.face_detected() {
            self.frames_with_face += 1;
        }

        let counter = match report.status {
            Status::NoFace => &mut self.no_face,
            Status::EyesNotFound => &mut self.eyes_not_found,
            Status::Active => &mut self.active,
            Status::Drowsy => &mut self.drowsy,
            Status::Sleeping => &mut self.sleeping,
        };
        *counter += 1;

        let previous = self.last_status.replace(report.status);
        match previous {
            Some(prev) if prev != report.status => {
                self.transitions += 1;
                Some(prev)
            }
            _ => None,
        }
    }

    pub fn count(&self, status: Status) -> u64 {
        match status {
            Status::NoFace => self.no_face,
            Status::EyesNotFound => self.eyes_not_found,
            Status::Active => self.active,
            Status::Drowsy => self.drowsy,
            Status::Sleeping => self.sleeping,
        }
    }

    /// Fraction of frames reported as drowsy or sleeping
    pub fn alert_ratio(&self) -> f32 {
        if self.frames == 0 {
            return 0.0;
        }
        (self.drowsy + self.sleeping) as f32 / self.frames as f32
    }
}
