//! Raw inference output to candidate detections

use crate::inference::{Cell, RawOutput};
use tracing::debug;

/// Axis-aligned box in pixel coordinates of the current frame, anchored at
/// its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }
}

/// A single detection. Candidates and accepted detections share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    /// In [0, 1]
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Turns per-cell inference records into candidates for one frame.
#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder {
    confidence_threshold: f32,
}

impl DetectionDecoder {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Candidates above the threshold, with geometry rescaled to the frame
    /// (not the inference input). Order follows the cells.
    pub fn decode(
        &self,
        output: &RawOutput,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<Detection> {
        let candidates: Vec<Detection> = output
            .cells()
            .filter_map(|cell| self.decode_cell(&cell, frame_width, frame_height))
            .collect();
        debug!("Decoded {} candidates", candidates.len());
        candidates
    }

    pub fn decode_cell(
        &self,
        cell: &Cell<'_>,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Detection> {
        let (class_id, confidence) = argmax(cell.scores())?;
        if !(confidence > self.confidence_threshold && confidence <= 1.0) {
            return None;
        }

        let geometry = [cell.center_x(), cell.center_y(), cell.width(), cell.height()];
        if geometry.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let (frame_width, frame_height) = (frame_width as f32, frame_height as f32);
        let center_x = (cell.center_x() * frame_width) as i32;
        let center_y = (cell.center_y() * frame_height) as i32;
        let width = (cell.width() * frame_width) as i32;
        let height = (cell.height() * frame_height) as i32;

        Some(Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                x: (center_x as f32 - width as f32 / 2.0) as i32,
                y: (center_y as f32 - height as f32 / 2.0) as i32,
                width,
                height,
            },
        })
    }
}

/// Index and value of the first maximal finite score.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| score.is_finite())
        .fold(None, |best, (idx, score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((idx, score)),
        })
}
