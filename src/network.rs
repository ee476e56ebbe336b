// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Heatmap network evaluators.
//!
//! The backbone, upsampling decoder and keypoint head are a single opaque transform
//! from an NCHW image batch to per-keypoint heatmaps. [`HeatmapNetwork`] is the seam
//! the model drives; [`OnnxNetwork`] implements it on an ONNX Runtime session.

use std::collections::HashMap;
use std::path::Path;

use half::f16;
use ndarray::Array4;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "openvino")]
use ort::execution_providers::OpenVINOExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::{DynValue, TensorRef};

use crate::device::Device;
use crate::error::{InferenceError, Result};
use crate::heatmap::HeatmapTensor;
use crate::metadata::{METADATA_KEYS, ModelMetadata};

/// A network mapping an image batch `(B, 3, H, W)` to heatmaps `(B, K, H/4, W/4)`.
///
/// Implementations are inference-only. Errors are reported as
/// [`InferenceError::InferenceError`] and are passed to the caller unchanged.
pub trait HeatmapNetwork {
    /// Run the network on an FP32 batch.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails or the output is not a 4-D tensor.
    fn forward(&mut self, input: &Array4<f32>) -> Result<HeatmapTensor>;

    /// Run the network on an FP16 batch.
    ///
    /// The default widens the input and calls [`HeatmapNetwork::forward`].
    ///
    /// # Errors
    ///
    /// Same as [`HeatmapNetwork::forward`].
    fn forward_f16(&mut self, input: &Array4<f16>) -> Result<HeatmapTensor> {
        self.forward(&input.mapv(f16::to_f32))
    }
}

/// Heatmap network backed by an ONNX Runtime session.
pub struct OnnxNetwork {
    session: Session,
    input_name: String,
    output_name: String,
    metadata: ModelMetadata,
}

impl OnnxNetwork {
    /// Open an ONNX model file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `num_threads` - Intra-op thread count, `0` lets ONNX Runtime decide.
    /// * `device` - Execution device, `None` for the ONNX Runtime default.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelLoadError`] if the file is missing, cannot be
    /// loaded, or has no outputs, and [`InferenceError::MetadataError`] if its
    /// metadata is malformed.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize, device: Option<Device>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InferenceError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let builder = Session::builder()
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to create session builder: {e}")))?;
        let builder = match device {
            Some(device) => register_device(builder, device)?,
            None => builder,
        };

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(num_threads)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to set intra-thread count: {e}")))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let metadata = extract_metadata(&session)?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "input".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::ModelLoadError("Model has no outputs".to_string()))?;

        Ok(Self {
            session,
            input_name,
            output_name,
            metadata,
        })
    }

    /// Metadata embedded in the model file.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Name of the image input.
    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Name of the heatmap output.
    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

/// Run the session on one input value and copy out the heatmap output.
macro_rules! run_session {
    ($network:expr, $tensor:expr) => {{
        let inputs = ort::inputs![&$network.input_name => $tensor];
        let outputs = $network
            .session
            .run(inputs)
            .map_err(|e| InferenceError::InferenceError(format!("Inference failed: {e}")))?;
        let output = outputs.get($network.output_name.as_str()).ok_or_else(|| {
            InferenceError::InferenceError(format!("Output '{}' not found", $network.output_name))
        })?;
        extract_heatmap(output)
    }};
}

impl HeatmapNetwork for OnnxNetwork {
    fn forward(&mut self, input: &Array4<f32>) -> Result<HeatmapTensor> {
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| InferenceError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        run_session!(self, tensor)
    }

    fn forward_f16(&mut self, input: &Array4<f16>) -> Result<HeatmapTensor> {
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| InferenceError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        run_session!(self, tensor)
    }
}

impl std::fmt::Debug for OnnxNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxNetwork")
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("backbone", &self.metadata.backbone)
            .finish_non_exhaustive()
    }
}

/// Copy a session output into a [`HeatmapTensor`], accepting FP32 or FP16 data.
fn extract_heatmap(output: &DynValue) -> Result<HeatmapTensor> {
    let (shape, data) = match output.try_extract_tensor::<f32>() {
        Ok((shape, data)) => (shape.iter().copied().collect::<Vec<i64>>(), data.to_vec()),
        Err(f32_err) => {
            let (shape, data) = output.try_extract_tensor::<f16>().map_err(|_| {
                InferenceError::InferenceError(format!("Failed to extract output: {f32_err}"))
            })?;
            (
                shape.iter().copied().collect::<Vec<i64>>(),
                data.iter().map(|v| v.to_f32()).collect(),
            )
        }
    };

    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<std::result::Result<Vec<usize>, _>>()
        .map_err(|_| InferenceError::InvalidShape(format!("Negative output dimension in {shape:?}")))?;
    HeatmapTensor::from_shape_vec(&dims, data)
}

/// Read the custom metadata properties the model was exported with.
fn extract_metadata(session: &Session) -> Result<ModelMetadata> {
    let model_metadata = session
        .metadata()
        .map_err(|e| InferenceError::ModelLoadError(format!("Failed to get model metadata: {e}")))?;

    let metadata_map: HashMap<String, String> = METADATA_KEYS
        .iter()
        .filter_map(|key| match model_metadata.custom(key) {
            Ok(Some(value)) => Some(((*key).to_string(), value)),
            _ => None,
        })
        .collect();

    if metadata_map.is_empty() {
        return Ok(ModelMetadata::default());
    }
    ModelMetadata::from_onnx_metadata(&metadata_map)
}

/// Register the execution provider for `device` on a session builder.
///
/// Devices whose provider is not compiled in fall back to CPU with a warning.
#[allow(unused_mut)]
fn register_device(mut builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    if !device.is_compiled() {
        eprintln!(
            "WARNING ⚠️ {device} requested but the '{}' feature is not enabled, using CPU",
            device.feature().unwrap_or_default()
        );
        return Ok(builder);
    }

    let provider_err =
        |e: ort::Error| InferenceError::ModelLoadError(format!("Failed to register {device} execution provider: {e}"));

    match device {
        #[cfg(feature = "cuda")]
        Device::Cuda(index) => {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(device_id(index)?)
                    .build()])
                .map_err(provider_err)?;
        }
        #[cfg(feature = "tensorrt")]
        Device::TensorRt(index) => {
            builder = builder
                .with_execution_providers([TensorRTExecutionProvider::default()
                    .with_device_id(device_id(index)?)
                    .build()])
                .map_err(provider_err)?;
        }
        #[cfg(feature = "coreml")]
        Device::CoreMl => {
            builder = builder
                .with_execution_providers([CoreMLExecutionProvider::default()
                    .with_subgraphs(true)
                    .build()])
                .map_err(provider_err)?;
        }
        #[cfg(feature = "openvino")]
        Device::OpenVino => {
            builder = builder
                .with_execution_providers([OpenVINOExecutionProvider::default().build()])
                .map_err(provider_err)?;
        }
        #[allow(unreachable_patterns)]
        _ => {
            let _ = provider_err;
        }
    }
    Ok(builder)
}

#[cfg(any(feature = "cuda", feature = "tensorrt"))]
fn device_id(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| InferenceError::ConfigError(format!("Device index {index} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::KeypointRecord;

    struct Constant(f32);

    impl HeatmapNetwork for Constant {
        fn forward(&mut self, input: &Array4<f32>) -> Result<HeatmapTensor> {
            let (b, _, h, w) = input.dim();
            HeatmapTensor::new(Array4::from_elem((b, 2, h / 4, w / 4), self.0))
        }
    }

    #[test]
    fn test_model_not_found() {
        let result = OnnxNetwork::load("nonexistent.onnx", 0, None);
        assert!(matches!(result.unwrap_err(), InferenceError::ModelLoadError(_)));
    }

    #[test]
    fn test_default_forward_f16() {
        let mut net = Constant(1.5);
        let input = Array4::from_elem((3, 3, 16, 8), f16::from_f32(0.5));
        let heatmaps = net.forward_f16(&input).unwrap();
        assert_eq!(heatmaps.dims(), (3, 2, 4, 2));

        let batch = crate::postprocessing::decode_heatmaps(&heatmaps);
        assert_eq!(batch.record(2, 1), KeypointRecord::new(0.0, 0.0, 1.5));
    }
}
