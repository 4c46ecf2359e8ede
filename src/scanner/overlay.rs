use serde::Serialize;

use crate::detect::DetectionResult;

// Logical detection box and decoration sizes, in frame units.
const BOX_WIDTH: f32 = 400.0;
const BOX_HEIGHT: f32 = 300.0;
const CORNER_LENGTH: f32 = 60.0;
const STROKE_WIDTH: f32 = 4.0;
const PLATE_WIDTH: f32 = 250.0;
const PLATE_HEIGHT: f32 = 40.0;
const PLATE_RAISE: f32 = 50.0;
const TEXT_INSET_X: f32 = 15.0;
const TEXT_RAISE: f32 = 22.0;

pub const PLATE_BACKGROUND: &str = "rgba(255, 255, 255, 0.95)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One L-shaped corner marker, an open polyline through three points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CornerBracket {
    pub points: [Point; 3],
}

/// Label box placed above the detection area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlate {
    pub origin: Point,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub text_origin: Point,
    pub text_color: String,
    pub background: String,
}

/// Derived overlay shapes for one frame geometry and one reading.
///
/// Pure data: recomputed on every tick and every resize, never persisted.
/// Identical inputs produce identical geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OverlayGeometry {
    pub brackets: Vec<CornerBracket>,
    pub stroke_width: f32,
    pub stroke_color: String,
    pub plate: Option<LabelPlate>,
}

impl OverlayGeometry {
    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty() && self.plate.is_none()
    }

    /// Corner brackets and label plate for a detection box centered in a
    /// `width` x `height` frame. No reading, or a degenerate frame, yields
    /// empty geometry (nothing drawn).
    pub fn compute(width: u32, height: u32, result: Option<&DetectionResult>) -> Self {
        let Some(result) = result else {
            return Self::default();
        };
        if width == 0 || height == 0 {
            return Self::default();
        }

        let frame_width = width as f32;
        let frame_height = height as f32;
        // The logical box clamps to small frames so brackets never leave
        // the visible area.
        let box_width = BOX_WIDTH.min(frame_width);
        let box_height = BOX_HEIGHT.min(frame_height);
        let length = CORNER_LENGTH.min(box_width / 2.0).min(box_height / 2.0);

        let left = (frame_width - box_width) / 2.0;
        let right = left + box_width;
        let top = (frame_height - box_height) / 2.0;
        let bottom = top + box_height;

        let brackets = vec![
            // Top-left
            CornerBracket {
                points: [
                    Point { x: left, y: top + length },
                    Point { x: left, y: top },
                    Point { x: left + length, y: top },
                ],
            },
            // Top-right
            CornerBracket {
                points: [
                    Point { x: right - length, y: top },
                    Point { x: right, y: top },
                    Point { x: right, y: top + length },
                ],
            },
            // Bottom-left
            CornerBracket {
                points: [
                    Point { x: left, y: bottom - length },
                    Point { x: left, y: bottom },
                    Point { x: left + length, y: bottom },
                ],
            },
            // Bottom-right
            CornerBracket {
                points: [
                    Point { x: right - length, y: bottom },
                    Point { x: right, y: bottom },
                    Point { x: right, y: bottom - length },
                ],
            },
        ];

        let plate = LabelPlate {
            origin: Point { x: left, y: top - PLATE_RAISE },
            width: PLATE_WIDTH,
            height: PLATE_HEIGHT,
            text: result.label.clone(),
            text_origin: Point { x: left + TEXT_INSET_X, y: top - TEXT_RAISE },
            text_color: result.accent_color.clone(),
            background: PLATE_BACKGROUND.to_string(),
        };

        Self {
            brackets,
            stroke_width: STROKE_WIDTH,
            stroke_color: result.accent_color.clone(),
            plate: Some(plate),
        }
    }
}
