//! Darknet YOLO detector through the OpenCV DNN module

use super::{InferenceEngine, OutputLayer, RawOutput, DEFAULT_INPUT_SIZE};
use crate::error::{Result, ScanError};
use crate::frame::Blob;
use opencv::core::{Mat, Scalar, Vector, CV_32F};
use opencv::dnn::{self, Net};
use opencv::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// YOLO network loaded from a `.cfg` + `.weights` pair.
pub struct DarknetEngine {
    net: Net,
    output_names: Vector<String>,
    input_size: (u32, u32),
}

impl DarknetEngine {
    pub fn load(config_path: &Path, weights_path: &Path) -> Result<Self> {
        Self::load_with_input_size(config_path, weights_path, DEFAULT_INPUT_SIZE)
    }

    pub fn load_with_input_size(
        config_path: &Path,
        weights_path: &Path,
        input_size: (u32, u32),
    ) -> Result<Self> {
        for path in [config_path, weights_path] {
            if !path.is_file() {
                return Err(ScanError::Io(format!("Model artifact not found: {:?}", path)));
            }
        }

        let net = dnn::read_net_from_darknet(
            &config_path.to_string_lossy(),
            &weights_path.to_string_lossy(),
        )
        .map_err(|e| ScanError::Model(format!("Failed to load Darknet model: {}", e)))?;

        let output_names = net
            .get_unconnected_out_layers_names()
            .map_err(|e| ScanError::Model(format!("Failed to list output layers: {}", e)))?;

        info!(
            "Darknet model loaded from {:?} ({} output layers)",
            weights_path,
            output_names.len()
        );

        Ok(Self {
            net,
            output_names,
            input_size,
        })
    }
}

impl InferenceEngine for DarknetEngine {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, blob: &Blob) -> Result<RawOutput> {
        let shape = blob.shape();
        let sizes = [shape[0] as i32, shape[1] as i32, shape[2] as i32, shape[3] as i32];
        let mut input = Mat::new_nd_with_default(&sizes, CV_32F, Scalar::all(0.0))?;
        input.data_typed_mut::<f32>()?.copy_from_slice(blob.as_slice());

        self.net
            .set_input(&input, "", 1.0, Scalar::default())
            .map_err(|e| ScanError::Model(format!("Failed to set network input: {}", e)))?;

        let mut outputs: Vector<Mat> = Vector::new();
        self.net
            .forward(&mut outputs, &self.output_names)
            .map_err(|e| ScanError::Model(format!("Forward pass failed: {}", e)))?;

        let mut layers = Vec::with_capacity(outputs.len());
        for output in outputs.iter() {
            let stride = output.cols().max(0) as usize;
            let data = output.data_typed::<f32>()?.to_vec();
            layers.push(OutputLayer::new(stride, data)?);
        }

        debug!("Darknet forward produced {} layers", layers.len());
        Ok(RawOutput::new(layers))
    }
}
