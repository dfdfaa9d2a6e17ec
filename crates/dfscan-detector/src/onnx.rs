//! ONNX Runtime model backend.
//!
//! Uses ONNX Runtime for inference with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::adapter::{CallConvention, Model};
use crate::error::{DetectorError, DetectorResult};
use crate::output::{OutputTensor, RawOutput};
use crate::preprocess::{FrameTensor, PixelNormalization};

const IMAGE_INPUT: &str = "image";
const LABEL_INPUT: &str = "label";

/// A classifier exported to ONNX.
pub struct OnnxModel {
    key: String,
    input_size: u32,
    normalization: PixelNormalization,
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxModel {
    /// Load a model from an `.onnx` file.
    pub fn load(
        key: impl Into<String>,
        path: &Path,
        input_size: u32,
        normalization: PixelNormalization,
    ) -> DetectorResult<Self> {
        if !path.exists() {
            return Err(DetectorError::ModelNotFound(path.display().to_string()));
        }

        let session = create_session(path)?;
        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let key = key.into();

        info!(
            model = %key,
            path = %path.display(),
            input_size,
            inputs = ?input_names,
            outputs = ?output_names,
            "ONNX model loaded"
        );

        Ok(Self {
            key,
            input_size,
            normalization,
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    fn has_input(&self, name: &str) -> bool {
        self.input_names.iter().any(|n| n == name)
    }

    fn image_value(&self, input: &FrameTensor) -> DetectorResult<Value> {
        Tensor::from_array((input.shape().to_vec(), input.data.clone().into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| DetectorError::runtime(format!("Failed to create tensor: {}", e)))
    }

    fn label_value(&self) -> DetectorResult<Value> {
        Tensor::from_array((vec![1usize], vec![0i64].into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| DetectorError::runtime(format!("Failed to create label tensor: {}", e)))
    }
}

impl Model for OnnxModel {
    fn name(&self) -> &str {
        &self.key
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn normalization(&self) -> PixelNormalization {
        self.normalization
    }

    fn invoke(&self, input: &FrameTensor, convention: CallConvention) -> DetectorResult<RawOutput> {
        let image = self.image_value(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectorError::runtime("Session lock poisoned"))?;

        let outputs = match convention {
            CallConvention::StructuredWithLabel => {
                if !self.has_input(IMAGE_INPUT) || !self.has_input(LABEL_INPUT) {
                    return Err(DetectorError::invocation("model has no image/label inputs"));
                }
                let label = self.label_value()?;
                session.run(ort::inputs![IMAGE_INPUT => image, LABEL_INPUT => label])
            }
            CallConvention::Structured => {
                if !self.has_input(IMAGE_INPUT) {
                    return Err(DetectorError::invocation("model has no image input"));
                }
                session.run(ort::inputs![IMAGE_INPUT => image])
            }
            CallConvention::Bare => session.run(ort::inputs![image]),
        }
        .map_err(|e| DetectorError::runtime(format!("ONNX inference failed: {}", e)))?;

        let mut named = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let Some(value) = outputs.get(name.as_str()) else {
                continue;
            };
            // non-float outputs (e.g. argmax labels) are not scores
            let Ok((shape, data)) = value.try_extract_tensor::<f32>() else {
                debug!(model = %self.key, output = %name, "Skipping non-f32 output");
                continue;
            };
            let shape: Vec<usize> = shape.iter().map(|d| (*d).max(0) as usize).collect();
            named.push((name.clone(), OutputTensor::new(shape, data.to_vec())));
        }
        if named.is_empty() {
            return Err(DetectorError::invalid_output("model produced no f32 outputs"));
        }
        Ok(RawOutput::Named(named))
    }
}

fn create_session(model_path: &Path) -> DetectorResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| DetectorError::runtime(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| DetectorError::runtime(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| DetectorError::runtime(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    debug!("Using CPU execution provider for detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| DetectorError::runtime(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weights() {
        let result = OnnxModel::load(
            "xception",
            Path::new("/nonexistent/xception.onnx"),
            299,
            PixelNormalization::SYMMETRIC,
        );
        assert!(matches!(result, Err(DetectorError::ModelNotFound(_))));
    }
}
