#![cfg(feature = "backend-opencv")]

use std::path::Path;

use image::GrayImage;
use opencv::core::{self, Mat, Scalar, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use tracing::{debug, info};

use crate::detector::{DetectParams, ObjectDetector};
use crate::geometry::Rect;
use crate::DmsError;

/// Viola-Jones detector backed by an OpenCV Haar cascade file.
///
/// The same model files ship with OpenCV (`haarcascade_frontalface_default.xml`,
/// `haarcascade_eye.xml`). `scale_factor`, `min_neighbors` and `min_size` are
/// handed straight to `detectMultiScale`.
pub struct HaarCascade {
    classifier: CascadeClassifier,
    name: String,
}

impl HaarCascade {
    /// Load a cascade from an XML model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DmsError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        if !path.is_file() {
            return Err(DmsError::Detection(format!("cascade file {} not found", name)));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| DmsError::Detection(format!("cascade path {} is not UTF-8", name)))?;
        let classifier = CascadeClassifier::new(path_str)
            .map_err(|e| DmsError::Detection(format!("failed to load cascade {}: {}", name, e)))?;
        if classifier.empty().map_err(detection_error)? {
            return Err(DmsError::Detection(format!("cascade {} is empty", name)));
        }

        info!("Loaded Haar cascade {}", name);
        Ok(Self { classifier, name })
    }
}

impl ObjectDetector for HaarCascade {
    fn detect(&mut self, image: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DmsError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let mat = gray_to_mat(image)?;
        let min_size = params
            .min_size
            .map(|(w, h)| Size::new(w as i32, h as i32))
            .unwrap_or_default();

        let mut found = Vector::<core::Rect>::new();
        self.classifier
            .detect_multi_scale(
                &mat,
                &mut found,
                f64::from(params.scale_factor),
                params.min_neighbors as i32,
                0,
                min_size,
                Size::default(),
            )
            .map_err(detection_error)?;

        let rects: Vec<Rect> = found
            .iter()
            .map(|r| Rect::new(r.x, r.y, r.width.max(0) as u32, r.height.max(0) as u32))
            .collect();
        debug!("{}: {} hits", self.name, rects.len());
        Ok(rects)
    }
}

/// Copy a grayscale image into a single-channel matrix
fn gray_to_mat(image: &GrayImage) -> Result<Mat, DmsError> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )
    .map_err(detection_error)?;
    mat.data_bytes_mut()
        .map_err(detection_error)?
        .copy_from_slice(image.as_raw());
    Ok(mat)
}

fn detection_error(e: opencv::Error) -> DmsError {
    DmsError::Detection(e.to_string())
}
