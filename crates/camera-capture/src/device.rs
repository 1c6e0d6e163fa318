//! Live capture from a camera device through OpenCV

use std::time::Instant;

use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use tracing::{info, warn};

use crate::frame::rgb_len;
use crate::{CameraError, FrameSource, VideoFrame};

/// Frames from a webcam or other capture device
pub struct DeviceSource {
    capture: videoio::VideoCapture,
    device: i32,
    bgr: Mat,
    rgb: Mat,
    sequence: u32,
    started: Instant,
}

impl DeviceSource {
    /// Open a device by index (0 is the default camera)
    pub fn open(device: i32) -> Result<Self, CameraError> {
        let mut capture = videoio::VideoCapture::new(device, videoio::CAP_ANY)
            .map_err(|e| CameraError::Open(format!("device {}: {}", device, e)))?;
        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::Open(format!("device {}: {}", device, e)))?;
        if !opened {
            return Err(CameraError::Open(format!("device {} is not available", device)));
        }

        // Keep latency low by not queueing stale frames
        if let Err(e) = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0) {
            warn!("Camera {} ignored buffer size hint: {}", device, e);
        }

        info!("Opened camera device {}", device);
        Ok(Self {
            capture,
            device,
            bgr: Mat::default(),
            rgb: Mat::default(),
            sequence: 0,
            started: Instant::now(),
        })
    }
}

impl FrameSource for DeviceSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let grabbed = self.capture.read(&mut self.bgr).map_err(capture_error)?;
        if !grabbed || self.bgr.empty() {
            info!("Camera {} stopped delivering frames", self.device);
            return Ok(None);
        }

        imgproc::cvt_color(
            &self.bgr,
            &mut self.rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(capture_error)?;

        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        let frame = from_rgb_mat(&self.rgb, timestamp_ns, self.sequence)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn release(&mut self) {
        info!("Releasing camera {} after {} frames", self.device, self.sequence);
        if let Err(e) = self.capture.release() {
            warn!("Failed to release camera {}: {}", self.device, e);
        }
    }
}

/// Copy an 8-bit, 3-channel RGB matrix into a frame
pub fn from_rgb_mat(mat: &Mat, timestamp_ns: u64, sequence: u32) -> Result<VideoFrame, CameraError> {
    if mat.typ() != core::CV_8UC3 {
        return Err(CameraError::Capture(format!(
            "expected 8-bit 3-channel frame, got type {}",
            mat.typ()
        )));
    }

    let data = if mat.is_continuous() {
        mat.data_bytes().map_err(capture_error)?.to_vec()
    } else {
        let packed = mat.try_clone().map_err(capture_error)?;
        packed.data_bytes().map_err(capture_error)?.to_vec()
    };

    Ok(VideoFrame::new(
        data,
        mat.cols() as u32,
        mat.rows() as u32,
        timestamp_ns,
        sequence,
    ))
}

/// Convert a frame into a BGR matrix for OpenCV drawing and display
pub fn to_bgr_mat(frame: &VideoFrame) -> Result<Mat, CameraError> {
    let expected = rgb_len(frame.width, frame.height);
    if frame.data.len() != expected {
        return Err(CameraError::Capture(format!(
            "frame {} has {} bytes, expected {}",
            frame.sequence,
            frame.data.len(),
            expected
        )));
    }

    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )
    .map_err(capture_error)?;
    rgb.data_bytes_mut()
        .map_err(capture_error)?
        .copy_from_slice(&frame.data);

    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(capture_error)?;
    Ok(bgr)
}

fn capture_error(e: opencv::Error) -> CameraError {
    CameraError::Capture(e.to_string())
}
