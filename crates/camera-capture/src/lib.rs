//! Camera Capture Library for Driver Monitoring
//!
//! Provides decoded RGB frames and pull-based frame sources.
//! Supports:
//! - Live camera devices through OpenCV (`ingest-opencv` feature)
//! - Recorded sessions replayed from a directory of still images
//! - In-memory frame sequences for tests and demos

#[cfg(feature = "ingest-opencv")]
pub mod device;
pub mod frame;
pub mod source;

#[cfg(feature = "ingest-opencv")]
pub use device::DeviceSource;
pub use frame::VideoFrame;
pub use source::{FrameSource, ImageSequenceSource, MemorySource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index; when set, frames come from the live device
    /// instead of `source_dir`
    pub device: Option<i32>,
    /// Directory holding the recorded frames (png, jpg, bmp)
    pub source_dir: PathBuf,
    /// Nominal frame rate, used to stamp frame timestamps
    pub fps: u32,
    /// Restart from the first frame instead of ending the stream
    pub loop_playback: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            source_dir: PathBuf::from("frames"),
            fps: 15,
            loop_playback: false,
        }
    }
}

impl CameraConfig {
    /// Nanoseconds between two consecutive frames
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
