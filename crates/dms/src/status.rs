//! Displayed driver status

use std::fmt;

use serde::{Deserialize, Serialize};

/// RGB display color
pub type Color = [u8; 3];

pub const YELLOW: Color = [255, 255, 0];
pub const DARK_ORANGE: Color = [255, 140, 0];
pub const GREEN: Color = [0, 255, 0];
pub const ORANGE: Color = [255, 165, 0];
pub const RED: Color = [255, 0, 0];

/// Status shown for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    NoFace,
    EyesNotFound,
    Active,
    Drowsy,
    Sleeping,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::NoFace => "No Face",
            Status::EyesNotFound => "Eyes Not Found",
            Status::Active => "Active",
            Status::Drowsy => "Drowsy",
            Status::Sleeping => "SLEEPING",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Status::NoFace => YELLOW,
            Status::EyesNotFound => DARK_ORANGE,
            Status::Active => GREEN,
            Status::Drowsy => ORANGE,
            Status::Sleeping => RED,
        }
    }

    /// Drowsy or sleeping
    pub fn is_alert(&self) -> bool {
        matches!(self, Status::Drowsy | Status::Sleeping)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
