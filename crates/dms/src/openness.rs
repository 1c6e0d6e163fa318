//! Eye openness estimation from eye bounding boxes

use crate::geometry::Rect;

/// Height over width of one eye box; a zero-width box counts as fully closed
pub fn eye_ratio(eye: &Rect) -> f32 {
    if eye.width == 0 {
        return 0.0;
    }
    eye.height as f32 / eye.width as f32
}

/// Mean openness over all eyes found in a face, `None` when there are no eyes
pub fn mean_openness(eyes: &[Rect]) -> Option<f32> {
    if eyes.is_empty() {
        return None;
    }
    let sum: f32 = eyes.iter().map(eye_ratio).sum();
    Some(sum / eyes.len() as f32)
}
