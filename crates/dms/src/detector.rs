//! Face and eye detection seam
//!
//! Detection itself is an external capability: anything that maps a
//! grayscale image to a set of candidate boxes. The analysis core only
//! depends on [`FaceEyeDetector`]. With the `backend-opencv` feature the
//! Haar cascades in the `cascade` module do the work; without it a
//! brightness/contrast heuristic keeps the pipeline running.

use std::collections::{BTreeMap, VecDeque};

use image::{imageops, GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use imageproc::stats::histogram;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackendKind, DmsConfig};
use crate::geometry::Rect;
use crate::DmsError;

/// Multi-scale detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectParams {
    /// Image pyramid step between scales (cascade backend)
    pub scale_factor: f32,
    /// Overlapping hits required to keep a candidate (cascade backend)
    pub min_neighbors: u32,
    /// Smallest accepted box (width, height)
    pub min_size: Option<(u32, u32)>,
}

impl DetectParams {
    pub fn faces() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: None,
        }
    }

    pub fn eyes() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: Some((20, 8)),
        }
    }

    /// Whether a candidate box passes the size filter
    pub fn admits(&self, rect: &Rect) -> bool {
        match self.min_size {
            Some((w, h)) => rect.width >= w && rect.height >= h,
            None => true,
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), DmsError> {
        if self.scale_factor.is_nan() || self.scale_factor <= 1.0 {
            return Err(DmsError::Config(format!(
                "{name}.scale_factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// A single-class object detector
pub trait ObjectDetector: Send {
    fn detect(&mut self, image: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DmsError>;
}

/// Detection capability used by the analysis loop.
///
/// Implementations may be stateful, hence `&mut self`.
pub trait FaceEyeDetector: Send {
    /// Face boxes in frame coordinates
    fn detect_faces(&mut self, gray: &GrayImage) -> Result<Vec<Rect>, DmsError>;

    /// Eye boxes relative to `region`, the upper half of one face
    fn detect_eyes(&mut self, region: &GrayImage) -> Result<Vec<Rect>, DmsError>;
}

/// Face and eye detection from two object detectors with their own parameters
pub struct CascadePair<F, E> {
    face: F,
    eye: E,
    face_params: DetectParams,
    eye_params: DetectParams,
}

impl<F: ObjectDetector, E: ObjectDetector> CascadePair<F, E> {
    pub fn new(face: F, eye: E, face_params: DetectParams, eye_params: DetectParams) -> Self {
        Self {
            face,
            eye,
            face_params,
            eye_params,
        }
    }
}

impl<F: ObjectDetector, E: ObjectDetector> FaceEyeDetector for CascadePair<F, E> {
    fn detect_faces(&mut self, gray: &GrayImage) -> Result<Vec<Rect>, DmsError> {
        self.face.detect(gray, &self.face_params)
    }

    fn detect_eyes(&mut self, region: &GrayImage) -> Result<Vec<Rect>, DmsError> {
        self.eye.detect(region, &self.eye_params)
    }
}

/// Build the detector selected by `config.backend`
pub fn build_detector(config: &DmsConfig) -> Result<Box<dyn FaceEyeDetector>, DmsError> {
    match config.backend.kind {
        BackendKind::Cascade => cascade_detector(config),
        BackendKind::Heuristic => Ok(heuristic_detector(config)),
        BackendKind::Auto if cfg!(feature = "backend-opencv") => cascade_detector(config),
        BackendKind::Auto => {
            warn!("Built without OpenCV. Using the brightness/contrast heuristic detector.");
            Ok(heuristic_detector(config))
        }
    }
}

#[cfg(feature = "backend-opencv")]
fn cascade_detector(config: &DmsConfig) -> Result<Box<dyn FaceEyeDetector>, DmsError> {
    use crate::cascade::HaarCascade;

    let backend = &config.backend;
    let face = HaarCascade::load(backend.cascade_dir.join(&backend.face_cascade))?;
    let eye = HaarCascade::load(backend.cascade_dir.join(&backend.eye_cascade))?;
    Ok(Box::new(CascadePair::new(
        face,
        eye,
        config.face_detection,
        config.eye_detection,
    )))
}

#[cfg(not(feature = "backend-opencv"))]
fn cascade_detector(_config: &DmsConfig) -> Result<Box<dyn FaceEyeDetector>, DmsError> {
    Err(DmsError::Config(
        "the cascade backend requires the backend-opencv feature".into(),
    ))
}

fn heuristic_detector(config: &DmsConfig) -> Box<dyn FaceEyeDetector> {
    let backend = &config.backend;
    info!(
        "Heuristic detector: face region {:?}, min brightness {}, min contrast {}",
        backend.face_region, backend.min_brightness, backend.min_contrast
    );
    Box::new(CascadePair::new(
        RegionDetector::new(backend.face_region, backend.min_brightness, backend.min_contrast),
        DarkBlobDetector::new(backend.dark_threshold),
        config.face_detection,
        config.eye_detection,
    ))
}

/// Reports one fixed region of the image, scaled to its size, when that
/// region holds a lit and textured scene.
///
/// A dark or flat region (lens covered, camera off, blank wall) yields nothing.
#[derive(Debug, Clone)]
pub struct RegionDetector {
    fractions: [f32; 4],
    min_brightness: u8,
    min_contrast: f32,
}

impl RegionDetector {
    pub fn new(fractions: [f32; 4], min_brightness: u8, min_contrast: f32) -> Self {
        Self {
            fractions,
            min_brightness,
            min_contrast,
        }
    }
}

impl ObjectDetector for RegionDetector {
    fn detect(&mut self, image: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DmsError> {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let [fx, fy, fw, fh] = self.fractions;
        let rect = Rect::new(
            (fx * w) as i32,
            (fy * h) as i32,
            (fw * w) as u32,
            (fh * h) as u32,
        );

        let Some(visible) = rect.clamp_to(image.width(), image.height()) else {
            return Ok(Vec::new());
        };
        if !params.admits(&rect) {
            return Ok(Vec::new());
        }

        let region = imageops::crop_imm(
            image,
            visible.x as u32,
            visible.y as u32,
            visible.width,
            visible.height,
        )
        .to_image();
        let (mean, std_dev) = luma_moments(&region);
        if mean < f32::from(self.min_brightness) || std_dev < self.min_contrast {
            debug!(
                "Region {:?} rejected: mean {:.1}, std dev {:.1}",
                rect, mean, std_dev
            );
            return Ok(Vec::new());
        }

        Ok(vec![rect])
    }
}

/// Mean and standard deviation of the gray levels
fn luma_moments(image: &GrayImage) -> (f32, f32) {
    let counts = &histogram(image).channels[0];
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return (0.0, 0.0);
    }

    let n = total as f64;
    let mean = counts
        .iter()
        .enumerate()
        .map(|(level, &c)| level as f64 * f64::from(c))
        .sum::<f64>()
        / n;
    let variance = counts
        .iter()
        .enumerate()
        .map(|(level, &c)| (level as f64 - mean).powi(2) * f64::from(c))
        .sum::<f64>()
        / n;
    (mean as f32, variance.sqrt() as f32)
}

/// Bounding boxes of connected dark regions
#[derive(Debug, Clone)]
pub struct DarkBlobDetector {
    threshold: u8,
}

impl DarkBlobDetector {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl ObjectDetector for DarkBlobDetector {
    fn detect(&mut self, image: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DmsError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y)[0] < self.threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        // label -> (min_x, min_y, max_x, max_y)
        let mut extents: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label[0];
            if id == 0 {
                continue;
            }
            let e = extents.entry(id).or_insert((x, y, x, y));
            e.0 = e.0.min(x);
            e.1 = e.1.min(y);
            e.2 = e.2.max(x);
            e.3 = e.3.max(y);
        }

        let mut rects: Vec<Rect> = extents
            .into_values()
            .map(|(x0, y0, x1, y1)| Rect::new(x0 as i32, y0 as i32, x1 - x0 + 1, y1 - y0 + 1))
            .filter(|r| params.admits(r))
            .collect();
        rects.sort_by_key(|r| (r.y, r.x));

        debug!("Dark blob detector found {} candidates", rects.len());
        Ok(rects)
    }
}

/// Pre-recorded detections for one frame
#[derive(Debug, Clone, Default)]
pub struct ScriptedFrame {
    pub faces: Vec<Rect>,
    /// Eye boxes per face, relative to that face's upper half
    pub eyes: Vec<Vec<Rect>>,
}

impl ScriptedFrame {
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn single(face: Rect, eyes: Vec<Rect>) -> Self {
        Self {
            faces: vec![face],
            eyes: vec![eyes],
        }
    }
}

/// Replays recorded detections frame by frame.
///
/// Frames past the end of the script report no faces.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    frames: VecDeque<ScriptedFrame>,
    pending_eyes: VecDeque<Vec<Rect>>,
}

impl ScriptedDetector {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self {
            frames: frames.into(),
            pending_eyes: VecDeque::new(),
        }
    }
}

impl FaceEyeDetector for ScriptedDetector {
    fn detect_faces(&mut self, _gray: &GrayImage) -> Result<Vec<Rect>, DmsError> {
        let frame = self.frames.pop_front().unwrap_or_default();
        self.pending_eyes = frame.eyes.into();
        Ok(frame.faces)
    }

    fn detect_eyes(&mut self, _region: &GrayImage) -> Result<Vec<Rect>, DmsError> {
        Ok(self.pending_eyes.pop_front().unwrap_or_default())
    }
}
