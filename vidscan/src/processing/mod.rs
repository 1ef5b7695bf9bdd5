//! Per-frame processing stages

pub mod annotate;
pub mod decode;
mod font;
pub mod suppress;

pub use annotate::{Annotator, Mark};
pub use decode::{BoundingBox, Detection, DetectionDecoder};
pub use suppress::{iou, Suppressor};
