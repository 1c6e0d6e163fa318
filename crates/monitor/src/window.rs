#![cfg(feature = "gui-opencv")]

//! On-screen display through OpenCV highgui

use std::time::Duration;

use camera_capture::device::to_bgr_mat;
use camera_capture::VideoFrame;
use dms::overlay::{Overlay, OverlayCommand};
use dms::status::Color;
use dms::FrameReport;
use opencv::core::{self, Mat, Point, Scalar};
use opencv::{highgui, imgproc};
use tracing::{info, warn};

use crate::display::DisplaySink;
use crate::exit::{ExitControl, ExitFlag};
use crate::MonitorError;

pub const WINDOW_TITLE: &str = "Drowsiness Detector";

const ESC: i32 = 27;

/// Shows each annotated frame in a highgui window
pub struct HighguiWindow {
    title: String,
}

impl HighguiWindow {
    pub fn open(title: &str) -> Result<Self, MonitorError> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE).map_err(display_error)?;
        info!("Opened display window \"{}\"", title);
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl DisplaySink for HighguiWindow {
    fn show(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), MonitorError> {
        let mut mat = to_bgr_mat(frame)?;
        draw_overlay(&mut mat, &report.overlay)?;
        highgui::imshow(&self.title, &mat).map_err(display_error)
    }

    fn close(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            warn!("Failed to close display window: {}", e);
        }
    }
}

/// Draw overlay commands onto a BGR matrix with OpenCV primitives
pub fn draw_overlay(mat: &mut Mat, overlay: &Overlay) -> Result<(), MonitorError> {
    for command in overlay.commands() {
        match command {
            OverlayCommand::Rect {
                rect,
                color,
                thickness,
            } => {
                let r = core::Rect::new(rect.x, rect.y, rect.width as i32, rect.height as i32);
                imgproc::rectangle(mat, r, bgr(*color), *thickness as i32, imgproc::LINE_8, 0)
                    .map_err(display_error)?;
            }
            OverlayCommand::Text {
                text,
                x,
                y,
                scale,
                color,
            } => {
                imgproc::put_text(
                    mat,
                    text,
                    Point::new(*x, *y),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    f64::from(*scale),
                    bgr(*color),
                    2,
                    imgproc::LINE_8,
                    false,
                )
                .map_err(display_error)?;
            }
        }
    }
    Ok(())
}

/// ESC in the display window, or Ctrl-C through the shared flag
pub struct EscapeKey {
    flag: ExitFlag,
}

impl EscapeKey {
    pub fn new(flag: ExitFlag) -> Self {
        Self { flag }
    }
}

impl ExitControl for EscapeKey {
    fn should_exit(&mut self, wait: Duration) -> bool {
        // wait_key(0) would block until a key arrives
        let delay = wait.as_millis().clamp(1, i32::MAX as u128) as i32;
        match highgui::wait_key(delay) {
            Ok(key) if key & 0xFF == ESC => {
                info!("ESC pressed");
                self.flag.trigger();
            }
            Ok(_) => {}
            Err(e) => warn!("Key poll failed: {}", e),
        }
        self.flag.is_set()
    }
}

fn bgr([r, g, b]: Color) -> Scalar {
    Scalar::new(f64::from(b), f64::from(g), f64::from(r), 0.0)
}

fn display_error(e: opencv::Error) -> MonitorError {
    MonitorError::Display(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::overlay::FACE_BOX_COLOR;
    use dms::{Rect, Status};
    use opencv::prelude::*;

    #[test]
    fn test_bgr_order() {
        let s = bgr([1, 2, 3]);
        assert_eq!((s[0], s[1], s[2]), (3.0, 2.0, 1.0));
    }

    #[test]
    fn test_draw_overlay_on_mat() {
        let frame = VideoFrame::filled(200, 150, [0, 0, 0], 0);
        let mut mat = to_bgr_mat(&frame).unwrap();

        let mut overlay = Overlay::new();
        overlay.push_rect(Rect::new(100, 60, 50, 50), FACE_BOX_COLOR, 2);
        overlay.push_text("SLEEPING", 20, 40, 1.0, Status::Sleeping.color());
        draw_overlay(&mut mat, &overlay).unwrap();

        let [r, g, b] = FACE_BOX_COLOR;
        let px = *mat.at_2d::<core::Vec3b>(80, 100).unwrap();
        assert_eq!((px[0], px[1], px[2]), (b, g, r));

        // Hershey text lands above the baseline
        let [r, g, b] = Status::Sleeping.color();
        let mut red_pixels = 0;
        for y in 15..40 {
            for x in 20..170 {
                let px = *mat.at_2d::<core::Vec3b>(y, x).unwrap();
                if (px[0], px[1], px[2]) == (b, g, r) {
                    red_pixels += 1;
                }
            }
        }
        assert!(red_pixels > 0);
    }
}
