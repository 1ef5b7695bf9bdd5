//! YOLO detector through ONNX Runtime

use super::{InferenceEngine, OutputLayer, RawOutput, CELL_HEADER, DEFAULT_INPUT_SIZE};
use crate::error::{Result, ScanError};
use crate::frame::Blob;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

/// YOLO export with a single `[1, cells, 5 + classes]` output whose geometry
/// is in input pixels. Geometry is normalized before it leaves the engine.
pub struct OnnxEngine {
    session: Session,
    input_size: (u32, u32),
}

impl OnnxEngine {
    pub fn load(model_path: &Path) -> Result<Self> {
        Self::load_with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    pub fn load_with_input_size(model_path: &Path, input_size: (u32, u32)) -> Result<Self> {
        if !model_path.is_file() {
            return Err(ScanError::Io(format!("Model artifact not found: {:?}", model_path)));
        }

        let session = Session::builder()
            .map_err(|e| ScanError::Ort(format!("Failed to create session builder: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ScanError::Ort(format!("Failed to load ONNX model: {}", e)))?;

        info!("ONNX model loaded from {:?}", model_path);

        Ok(Self {
            session,
            input_size,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, blob: &Blob) -> Result<RawOutput> {
        let input = Tensor::from_array((blob.shape(), blob.as_slice().to_vec().into_boxed_slice()))
            .map_err(|e| ScanError::Ort(format!("Failed to create input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| ScanError::Ort(format!("Inference failed: {}", e)))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| ScanError::Model("Model produced no outputs".to_string()))?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| ScanError::Ort(format!("Failed to extract output tensor: {}", e)))?;

        debug!("ONNX output shape: {:?}", shape);
        let dims: &[i64] = shape;
        let stride = match dims {
            [1, _, stride] if *stride > CELL_HEADER as i64 => *stride as usize,
            _ => {
                return Err(ScanError::Model(format!(
                    "Unsupported output shape {:?}, expected [1, cells, 5 + classes]",
                    dims
                )))
            }
        };

        let (input_width, input_height) = (self.input_size.0 as f32, self.input_size.1 as f32);
        let mut cells = data.to_vec();
        for cell in cells.chunks_exact_mut(stride) {
            cell[0] /= input_width;
            cell[1] /= input_height;
            cell[2] /= input_width;
            cell[3] /= input_height;
        }

        Ok(RawOutput::new(vec![OutputLayer::new(stride, cells)?]))
    }
}
