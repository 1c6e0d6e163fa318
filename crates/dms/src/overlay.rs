//! Draw commands for the display sink

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::status::Color;

pub const FACE_BOX_COLOR: Color = [0, 255, 0];
pub const EYE_BOX_COLOR: Color = [0, 200, 255];
pub const TEXT_COLOR: Color = [255, 255, 255];

/// Where the status line is anchored (text baseline, top-left origin)
pub const STATUS_ORIGIN: (i32, i32) = (20, 40);
pub const STATUS_SCALE: f32 = 1.0;
pub const RATIO_SCALE: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverlayCommand {
    Rect {
        rect: Rect,
        color: Color,
        thickness: u32,
    },
    Text {
        text: String,
        /// Left end of the baseline
        x: i32,
        y: i32,
        scale: f32,
        color: Color,
    },
}

/// Ordered draw commands for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    commands: Vec<OverlayCommand>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rect(&mut self, rect: Rect, color: Color, thickness: u32) {
        self.commands.push(OverlayCommand::Rect {
            rect,
            color,
            thickness,
        });
    }

    pub fn push_text(&mut self, text: impl Into<String>, x: i32, y: i32, scale: f32, color: Color) {
        self.commands.push(OverlayCommand::Text {
            text: text.into(),
            x,
            y,
            scale,
            color,
        });
    }

    pub fn commands(&self) -> &[OverlayCommand] {
        &self.commands
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            OverlayCommand::Text { text, .. } => Some(text.as_str()),
            OverlayCommand::Rect { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_keep_order() {
        let mut overlay = Overlay::new();
        overlay.push_rect(Rect::new(0, 0, 10, 10), FACE_BOX_COLOR, 2);
        overlay.push_text("Ratio: 0.25", 0, -10, RATIO_SCALE, TEXT_COLOR);
        overlay.push_text("Active", 20, 40, STATUS_SCALE, [0, 255, 0]);

        assert_eq!(overlay.len(), 3);
        assert!(matches!(overlay.commands()[0], OverlayCommand::Rect { thickness: 2, .. }));
        assert_eq!(overlay.texts().collect::<Vec<_>>(), vec!["Ratio: 0.25", "Active"]);
    }
}
