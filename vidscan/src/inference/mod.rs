//! Detector inference
//!
//! The detector itself is a black box: it takes a preprocessed [`Blob`] and
//! returns raw per-cell records. Each cell is laid out as
//! `[center_x, center_y, width, height, objectness, score_0, .., score_n]`
//! with geometry normalized to [0, 1] of the inference input.

#[cfg(feature = "opencv")]
pub mod darknet;
#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "opencv")]
pub use darknet::DarknetEngine;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;

use crate::error::{Result, ScanError};
use crate::frame::Blob;

/// Number of leading values in a cell before the class scores.
pub const CELL_HEADER: usize = 5;

/// Default square input resolution.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

/// A pretrained detector. Reused for every frame of a run; calls are
/// independent of each other.
pub trait InferenceEngine {
    /// `(width, height)` the blob must be resized to.
    fn input_size(&self) -> (u32, u32);

    fn infer(&mut self, blob: &Blob) -> Result<RawOutput>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn infer(&mut self, blob: &Blob) -> Result<RawOutput> {
        (**self).infer(blob)
    }
}

/// One output layer: a dense row-major matrix of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayer {
    stride: usize,
    data: Vec<f32>,
}

impl OutputLayer {
    /// `stride` is the number of values per cell.
    pub fn new(stride: usize, data: Vec<f32>) -> Result<Self> {
        if stride <= CELL_HEADER {
            return Err(ScanError::Model(format!(
                "cell stride {} leaves no room for class scores",
                stride
            )));
        }
        if data.len() % stride != 0 {
            return Err(ScanError::Model(format!(
                "{} values do not divide into cells of {}",
                data.len(),
                stride
            )));
        }
        Ok(Self { stride, data })
    }

    pub fn from_cells(cells: &[Vec<f32>]) -> Result<Self> {
        let stride = cells.first().map(Vec::len).unwrap_or(CELL_HEADER + 1);
        if cells.iter().any(|c| c.len() != stride) {
            return Err(ScanError::Model("cells have differing lengths".to_string()));
        }
        Self::new(stride, cells.concat())
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> {
        self.data.chunks_exact(self.stride).map(|values| Cell { values })
    }
}

/// Everything one forward pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutput {
    layers: Vec<OutputLayer>,
}

impl RawOutput {
    pub fn new(layers: Vec<OutputLayer>) -> Self {
        Self { layers }
    }

    /// Cells of every layer, in layer order.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> {
        self.layers.iter().flat_map(OutputLayer::cells)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    values: &'a [f32],
}

impl<'a> Cell<'a> {
    pub fn center_x(&self) -> f32 {
        self.values[0]
    }

    pub fn center_y(&self) -> f32 {
        self.values[1]
    }

    pub fn width(&self) -> f32 {
        self.values[2]
    }

    pub fn height(&self) -> f32 {
        self.values[3]
    }

    pub fn objectness(&self) -> f32 {
        self.values[4]
    }

    pub fn scores(&self) -> &'a [f32] {
        &self.values[CELL_HEADER..]
    }
}
