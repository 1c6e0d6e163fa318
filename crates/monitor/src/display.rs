//! Overlay rendering and frame output

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use camera_capture::VideoFrame;
use dms::overlay::{Overlay, OverlayCommand};
use dms::status::Color;
use dms::{FrameReport, Rect};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use tracing::{debug, info, warn};

use crate::MonitorError;

/// Approximate glyph box of the overlay font at scale 1.0
const GLYPH_WIDTH: f32 = 20.0;
const GLYPH_HEIGHT: f32 = 22.0;

/// Pixel height of the text font at overlay scale 1.0
const FONT_PX: f32 = 30.0;

/// Searched in order when no font is configured
const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load the overlay font.
///
/// An explicit path must load. Without one the usual system locations are
/// tried, and `None` means text falls back to solid label boxes.
pub fn load_font(path: Option<&Path>) -> Result<Option<FontVec>, MonitorError> {
    if let Some(path) = path {
        return read_font(path).map(Some);
    }

    for candidate in FONT_SEARCH_PATHS {
        let candidate = Path::new(candidate);
        if !candidate.is_file() {
            continue;
        }
        match read_font(candidate) {
            Ok(font) => {
                info!("Overlay font: {}", candidate.display());
                return Ok(Some(font));
            }
            Err(e) => debug!("Skipping font {}: {}", candidate.display(), e),
        }
    }

    warn!("No TrueType font found; overlay text will be drawn as label boxes");
    Ok(None)
}

fn read_font(path: &Path) -> Result<FontVec, MonitorError> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| MonitorError::Display(format!("{}: {}", path.display(), e)))
}

/// Receives every analyzed frame
pub trait DisplaySink {
    fn show(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), MonitorError>;

    /// Tear down windows or flush output
    fn close(&mut self) {}
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn show(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), MonitorError> {
        (**self).show(frame, report)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Draws the overlay onto each frame and optionally saves it as PNG
pub struct AnnotatedFrameWriter {
    output_dir: Option<PathBuf>,
    font: Option<FontVec>,
    written: u64,
}

impl AnnotatedFrameWriter {
    pub fn new(output_dir: Option<PathBuf>) -> Result<Self, MonitorError> {
        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir)?;
            info!("Writing annotated frames to {}", dir.display());
        }
        Ok(Self {
            output_dir,
            font: None,
            written: 0,
        })
    }

    /// Render overlay text with this font instead of label boxes
    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.font = font;
        self
    }

    /// Frames saved so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DisplaySink for AnnotatedFrameWriter {
    fn show(&mut self, frame: &VideoFrame, report: &FrameReport) -> Result<(), MonitorError> {
        for text in report.overlay.texts() {
            debug!("Frame {} overlay: {}", frame.sequence, text);
        }

        let Some(dir) = &self.output_dir else {
            return Ok(());
        };

        let img = render(frame, &report.overlay, self.font.as_ref())?;
        let path = dir.join(format!("frame_{:06}.png", frame.sequence));
        img.save(&path)
            .map_err(|e| MonitorError::Display(format!("{}: {}", path.display(), e)))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.output_dir.is_some() {
            info!("Annotated frame writer closed after {} frames", self.written);
        }
    }
}

/// Apply an overlay to a copy of the frame
pub fn render(
    frame: &VideoFrame,
    overlay: &Overlay,
    font: Option<&FontVec>,
) -> Result<RgbImage, MonitorError> {
    let mut img = frame.to_rgb_image().ok_or_else(|| {
        MonitorError::Display(format!(
            "frame {} buffer does not match {}x{}",
            frame.sequence, frame.width, frame.height
        ))
    })?;

    for command in overlay.commands() {
        match command {
            OverlayCommand::Rect {
                rect,
                color,
                thickness,
            } => draw_box(&mut img, rect, *color, *thickness),
            OverlayCommand::Text {
                text,
                x,
                y,
                scale,
                color,
            } => match font {
                Some(font) => draw_glyphs(&mut img, font, text, *x, *y, *scale, *color),
                None => draw_label(&mut img, text, *x, *y, *scale, *color),
            },
        }
    }

    Ok(img)
}

fn draw_box(img: &mut RgbImage, rect: &Rect, color: Color, thickness: u32) {
    for inset in 0..thickness.max(1) {
        let width = rect.width.saturating_sub(2 * inset);
        let height = rect.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let r = PixelRect::at(rect.x + inset as i32, rect.y + inset as i32).of_size(width, height);
        draw_hollow_rect_mut(img, r, Rgb(color));
    }
}

/// Text with its baseline at (x, y), drawn twice for a 2px stroke
fn draw_glyphs(
    img: &mut RgbImage,
    font: &FontVec,
    text: &str,
    x: i32,
    y: i32,
    scale: f32,
    color: Color,
) {
    let px = PxScale::from(FONT_PX * scale);
    let top = y - font.as_scaled(px).ascent().round() as i32;
    draw_text_mut(img, Rgb(color), x, top, px, font, text);
    draw_text_mut(img, Rgb(color), x + 1, top, px, font, text);
}

/// Label box sitting on the text baseline at (x, y)
fn draw_label(img: &mut RgbImage, text: &str, x: i32, y: i32, scale: f32, color: Color) {
    let width = (text.chars().count() as f32 * GLYPH_WIDTH * scale) as u32;
    let height = (GLYPH_HEIGHT * scale) as u32;
    if width == 0 || height == 0 {
        return;
    }
    let r = PixelRect::at(x, y - height as i32).of_size(width, height);
    draw_filled_rect_mut(img, r, Rgb(color));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::overlay::{FACE_BOX_COLOR, STATUS_SCALE};
    use dms::Status;

    fn overlay() -> Overlay {
        let mut overlay = Overlay::new();
        overlay.push_rect(Rect::new(100, 60, 50, 50), FACE_BOX_COLOR, 2);
        overlay.push_text("SLEEPING", 20, 40, STATUS_SCALE, Status::Sleeping.color());
        overlay
    }

    #[test]
    fn test_render_draws_box_and_label() {
        let frame = VideoFrame::filled(200, 150, [0, 0, 0], 0);
        let img = render(&frame, &overlay(), None).unwrap();

        // Both rings of a thickness-2 box
        assert_eq!(img.get_pixel(100, 80).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(101, 80).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(102, 80).0, [0, 0, 0]);

        // Label box ends just above the baseline
        assert_eq!(img.get_pixel(21, 39).0, Status::Sleeping.color());
        assert_eq!(img.get_pixel(21, 41).0, [0, 0, 0]);
    }

    #[test]
    fn test_render_clips_offscreen_commands() {
        let mut overlay = Overlay::new();
        overlay.push_rect(Rect::new(-20, -20, 500, 500), FACE_BOX_COLOR, 1);
        overlay.push_text("Ratio: 0.10", -5, 3, 0.6, [255, 255, 255]);

        let frame = VideoFrame::filled(40, 30, [0, 0, 0], 0);
        assert!(render(&frame, &overlay, None).is_ok());
    }

    #[test]
    fn test_render_rejects_short_buffer() {
        let frame = VideoFrame::new(vec![0; 10], 40, 30, 0, 0);
        assert!(render(&frame, &Overlay::new(), None).is_err());
    }

    #[test]
    fn test_explicit_font_must_load() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();

        assert!(matches!(
            load_font(Some(&bogus)),
            Err(MonitorError::Display(_))
        ));
        assert!(matches!(
            load_font(Some(&dir.path().join("absent.ttf"))),
            Err(MonitorError::Io(_))
        ));
    }

    #[test]
    #[ignore = "needs DejaVuSans.ttf installed"]
    fn test_render_draws_glyphs() {
        let font = load_font(Some(Path::new(FONT_SEARCH_PATHS[0]))).unwrap();
        let frame = VideoFrame::filled(200, 150, [0, 0, 0], 0);
        let img = render(&frame, &overlay(), font.as_ref()).unwrap();

        // Glyph strokes, not a solid block: the text area holds both colors
        let red = Status::Sleeping.color();
        let area: Vec<[u8; 3]> = (20..120)
            .flat_map(|x| (18..40).map(move |y| (x, y)))
            .map(|(x, y)| img.get_pixel(x, y).0)
            .collect();
        assert!(area.contains(&red));
        assert!(area.contains(&[0, 0, 0]));
    }

    #[test]
    fn test_writer_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated");
        let mut writer = AnnotatedFrameWriter::new(Some(out.clone())).unwrap();

        let frame = VideoFrame::filled(64, 48, [10, 10, 10], 3);
        let report = FrameReport {
            overlay: overlay(),
            ..Default::default()
        };
        writer.show(&frame, &report).unwrap();

        assert_eq!(writer.written(), 1);
        assert!(out.join("frame_000003.png").exists());
    }

    #[test]
    fn test_writer_without_output_dir() {
        let mut writer = AnnotatedFrameWriter::new(None).unwrap();
        let frame = VideoFrame::filled(8, 8, [0, 0, 0], 0);
        writer.show(&frame, &FrameReport::default()).unwrap();
        assert_eq!(writer.written(), 0);
    }
}
