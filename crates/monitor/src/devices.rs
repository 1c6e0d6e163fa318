//! Frame source, display and exit control for the running build

use camera_capture::{CameraConfig, FrameSource, ImageSequenceSource};
use tracing::info;

use crate::display::{load_font, AnnotatedFrameWriter, DisplaySink};
use crate::exit::{ExitControl, ExitFlag};
use crate::{DisplayConfig, MonitorError};

/// Live device when `camera.device` is set, otherwise the recorded frames
pub fn open_source(camera: &CameraConfig) -> Result<Box<dyn FrameSource>, MonitorError> {
    match camera.device {
        Some(device) => open_device(device),
        None => Ok(Box::new(ImageSequenceSource::open(camera)?)),
    }
}

#[cfg(feature = "gui-opencv")]
fn open_device(device: i32) -> Result<Box<dyn FrameSource>, MonitorError> {
    Ok(Box::new(camera_capture::DeviceSource::open(device)?))
}

#[cfg(not(feature = "gui-opencv"))]
fn open_device(device: i32) -> Result<Box<dyn FrameSource>, MonitorError> {
    Err(MonitorError::Camera(camera_capture::CameraError::Open(format!(
        "camera device {} needs a build with the gui-opencv feature",
        device
    ))))
}

/// On-screen window with ESC to exit when available, otherwise the
/// annotated frame writer with the Ctrl-C flag
pub fn open_display(
    display: &DisplayConfig,
    exit: ExitFlag,
) -> Result<(Box<dyn DisplaySink>, Box<dyn ExitControl>), MonitorError> {
    if display.window {
        if let Some(window) = open_window(exit.clone()) {
            return Ok(window);
        }
    }

    let font = match display.output_dir {
        Some(_) => load_font(display.font_path.as_deref())?,
        None => None,
    };
    let writer = AnnotatedFrameWriter::new(display.output_dir.clone())?.with_font(font);
    info!("Display: annotated frame writer, Ctrl-C to exit");
    Ok((Box::new(writer), Box::new(exit)))
}

#[cfg(feature = "gui-opencv")]
fn open_window(exit: ExitFlag) -> Option<(Box<dyn DisplaySink>, Box<dyn ExitControl>)> {
    use crate::window::{EscapeKey, HighguiWindow, WINDOW_TITLE};

    match HighguiWindow::open(WINDOW_TITLE) {
        Ok(window) => {
            info!("Display: window, ESC to exit");
            Some((Box::new(window), Box::new(EscapeKey::new(exit))))
        }
        Err(e) => {
            tracing::warn!("Failed to open display window: {}. Running headless.", e);
            None
        }
    }
}

#[cfg(not(feature = "gui-opencv"))]
fn open_window(_exit: ExitFlag) -> Option<(Box<dyn DisplaySink>, Box<dyn ExitControl>)> {
    info!("Built without OpenCV, no display window");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_recorded_frames_source() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(4, 4).save(dir.path().join("0.png")).unwrap();
        let camera = CameraConfig {
            source_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let mut source = open_source(&camera).unwrap();
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
    }

    #[cfg(not(feature = "gui-opencv"))]
    #[test]
    fn test_device_needs_opencv_build() {
        let camera = CameraConfig {
            device: Some(0),
            ..Default::default()
        };
        assert!(matches!(open_source(&camera), Err(MonitorError::Camera(_))));
    }

    #[test]
    fn test_headless_display_uses_flag() {
        let display = DisplayConfig {
            window: false,
            ..Default::default()
        };
        let flag = ExitFlag::new();
        let (_sink, mut exit) = open_display(&display, flag.clone()).unwrap();

        assert!(!exit.should_exit(Duration::ZERO));
        flag.trigger();
        assert!(exit.should_exit(Duration::ZERO));
    }
}
