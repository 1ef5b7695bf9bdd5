//! vidscan: object detection over video files
//!
//! Reads a video frame by frame, runs a pretrained YOLO-style detector on
//! each frame, suppresses overlapping detections, draws the survivors and
//! writes the annotated frames to a video container and a live window.
//!
//! The core stages work on plain [`Frame`] buffers and are independent of
//! any native library. Video I/O and the Darknet backend need the `opencv`
//! feature; the ONNX Runtime backend needs the `onnx` feature.

pub mod config;
pub mod control;
pub mod error;
pub mod frame;
pub mod inference;
pub mod io;
pub mod labels;
pub mod pipeline;
pub mod processing;

pub use config::{BoxColor, ConfigForm, LoopSettings, OutputSettings, RunConfig};
pub use control::{ControlEvent, KeyBindings, LoopState, RunState};
pub use error::{Result, ScanError};
pub use frame::{preprocess, Blob, Frame};
pub use inference::{InferenceEngine, OutputLayer, RawOutput};
pub use io::{Display, FrameSink, FrameSource, NullDisplay};
pub use labels::LabelTable;
pub use pipeline::{FrameReport, Pipeline, PipelineParts, RunSummary, StepOutcome, StopReason};
pub use processing::{Annotator, BoundingBox, Detection, DetectionDecoder, Mark, Suppressor};
