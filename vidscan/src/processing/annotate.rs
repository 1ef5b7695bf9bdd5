//! Frame annotation

use super::decode::{BoundingBox, Detection};
use super::font;
use crate::config::{BoxColor, RunConfig};
use crate::control::RunState;
use crate::frame::Frame;
use crate::labels::LabelTable;

/// Top-left anchor of the object count readout.
pub const COUNT_ORIGIN: (i32, i32) = (10, 30);
/// Vertical offsets of the label and confidence lines below a box's top edge.
pub const LABEL_OFFSET: i32 = 30;
pub const CONFIDENCE_OFFSET: i32 = 60;
pub const STROKE_WIDTH: i32 = 2;

/// One drawing operation on a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Rect {
        bbox: BoundingBox,
        color: BoxColor,
        thickness: i32,
    },
    Text {
        text: String,
        /// Baseline-left corner
        origin: (i32, i32),
        color: BoxColor,
        scale: f32,
    },
}

/// Draws accepted detections and the running object count.
#[derive(Debug, Clone)]
pub struct Annotator {
    color: BoxColor,
    font_scale: f32,
    show_confidences: bool,
}

impl Annotator {
    pub fn new(color: BoxColor, font_scale: f32, show_confidences: bool) -> Self {
        Self {
            color,
            font_scale,
            show_confidences,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.box_color, config.font_scale, config.show_confidences)
    }

    /// Marks for one frame, in drawing order. Detections whose class id has
    /// no label are skipped.
    pub fn marks(&self, detections: &[Detection], labels: &LabelTable) -> Vec<Mark> {
        let mut marks = Vec::with_capacity(detections.len() * 3 + 1);

        for detection in detections {
            let label = match labels.get(detection.class_id) {
                Some(label) => label,
                None => continue,
            };
            let bbox = detection.bbox;
            marks.push(Mark::Rect {
                bbox,
                color: self.color,
                thickness: STROKE_WIDTH,
            });
            if self.show_confidences {
                marks.push(Mark::Text {
                    text: label.to_string(),
                    origin: (bbox.x, bbox.y.saturating_add(LABEL_OFFSET)),
                    color: self.color,
                    scale: self.font_scale,
                });
                marks.push(Mark::Text {
                    text: format!("{:.2}%", detection.confidence * 100.0),
                    origin: (bbox.x, bbox.y.saturating_add(CONFIDENCE_OFFSET)),
                    color: self.color,
                    scale: self.font_scale,
                });
            }
        }

        marks.push(Mark::Text {
            text: format!("Objects: {}", detections.len()),
            origin: COUNT_ORIGIN,
            color: BoxColor::WHITE,
            scale: self.font_scale,
        });

        marks
    }

    /// Paint the frame in place and record the object count.
    pub fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
        labels: &LabelTable,
        state: &mut RunState,
    ) -> Vec<Mark> {
        state.objects_in_current_frame = detections.len();
        let marks = self.marks(detections, labels);
        for mark in &marks {
            paint(frame, mark);
        }
        marks
    }
}

pub fn paint(frame: &mut Frame, mark: &Mark) {
    match mark {
        Mark::Rect {
            bbox,
            color,
            thickness,
        } => stroke_rect(frame, bbox, *thickness, color.to_bgr()),
        Mark::Text {
            text,
            origin,
            color,
            scale,
        } => font::draw_text(frame, text, *origin, *scale, color.to_bgr()),
    }
}

/// Outline from `(x, y)` to `(x + width, y + height)`, with the stroke
/// centred on the edges.
fn stroke_rect(frame: &mut Frame, bbox: &BoundingBox, thickness: i32, bgr: [u8; 3]) {
    let thickness = thickness.max(1);
    let lo = -(thickness / 2);
    let hi = lo + thickness - 1;
    let (left, top, right, bottom) = (bbox.x, bbox.y, bbox.right(), bbox.bottom());
    let (x0, y0) = (left.saturating_add(lo), top.saturating_add(lo));
    let (x1, y1) = (right.saturating_add(hi), bottom.saturating_add(hi));

    frame.fill_rect(x0, y0, x1, top.saturating_add(hi), bgr);
    frame.fill_rect(x0, bottom.saturating_add(lo), x1, y1, bgr);
    frame.fill_rect(x0, y0, left.saturating_add(hi), y1, bgr);
    frame.fill_rect(right.saturating_add(lo), y0, x1, y1, bgr);
}
