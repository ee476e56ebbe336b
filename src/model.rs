// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose model loading and inference.
//!
//! [`PoseModel`] drives a [`HeatmapNetwork`] and the heatmap decoder. [`PoseModel::infer`]
//! is the tensor-level entry point; the `predict*` methods take images, handle
//! preprocessing, and map keypoints back to original-image pixels.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;

use crate::architecture::{HEATMAP_STRIDE, INPUT_CHANNELS, heatmap_size};
use crate::error::{InferenceError, Result};
use crate::heatmap::HeatmapTensor;
use crate::inference::InferenceConfig;
use crate::metadata::ModelMetadata;
use crate::network::{HeatmapNetwork, OnnxNetwork};
use crate::postprocessing::decode_heatmaps_with;
use crate::preprocessing::{
    PreprocessResult, image_to_array, preprocess_image, scale_keypoints, stack_batch,
    tensor_f32_to_f16,
};
use crate::results::{Keypoints, PoseOutput, Results, Speed};

/// SimplePose model for inference.
///
/// # Example
///
/// ```no_run
/// use simplepose_inference::PoseModel;
///
/// let mut model = PoseModel::load("simplepose_resnet18_coco.onnx")?;
/// let results = model.predict("person.jpg")?;
/// println!("{}", results[0].verbose());
/// # Ok::<(), simplepose_inference::InferenceError>(())
/// ```
pub struct PoseModel<N: HeatmapNetwork = OnnxNetwork> {
    network: N,
    metadata: ModelMetadata,
    config: InferenceConfig,
    imgsz: (usize, usize),
    keypoints: usize,
    warmed_up: bool,
}

impl PoseModel<OnnxNetwork> {
    /// Load a pose model from an ONNX file.
    ///
    /// Backbone, input size, keypoint count and keypoint names are read from the
    /// model's custom metadata properties.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file doesn't exist or can't be loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, InferenceConfig::default())
    }

    /// Load a pose model with custom configuration.
    ///
    /// Explicit `imgsz` and `keypoints` in `config` take precedence over metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the model can't be loaded or the configuration is invalid.
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        let network = OnnxNetwork::load(path, config.num_threads, config.device)?;
        let metadata = network.metadata().clone();
        Self::with_metadata(network, metadata, config)
    }
}

impl<N: HeatmapNetwork> PoseModel<N> {
    /// Wrap an arbitrary heatmap network.
    ///
    /// Settings not given in `config` fall back to the ResNet-18 COCO defaults.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ConfigError`] if the input size is not a positive
    /// multiple of the heatmap stride or the keypoint count is zero.
    pub fn from_network(network: N, config: InferenceConfig) -> Result<Self> {
        Self::with_metadata(network, ModelMetadata::default(), config)
    }

    fn with_metadata(network: N, metadata: ModelMetadata, config: InferenceConfig) -> Result<Self> {
        let imgsz = config.imgsz.unwrap_or(metadata.imgsz);
        let keypoints = config.keypoints.unwrap_or(metadata.keypoints);

        if imgsz.0 < HEATMAP_STRIDE
            || imgsz.1 < HEATMAP_STRIDE
            || imgsz.0 % HEATMAP_STRIDE != 0
            || imgsz.1 % HEATMAP_STRIDE != 0
        {
            return Err(InferenceError::ConfigError(format!(
                "Input size {imgsz:?} must be positive multiples of {HEATMAP_STRIDE}"
            )));
        }
        if keypoints == 0 {
            return Err(InferenceError::ConfigError(
                "Keypoint count must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            network,
            metadata,
            config,
            imgsz,
            keypoints,
            warmed_up: false,
        })
    }

    /// Warm up the model by running inference with a dummy input.
    ///
    /// Called automatically before the first `predict*`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dummy inference fails.
    pub fn warmup(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }
        let dummy_input = Array4::<f32>::zeros((1, INPUT_CHANNELS, self.imgsz.0, self.imgsz.1));
        let _ = self.run_network(&dummy_input)?;
        self.warmed_up = true;
        Ok(())
    }

    /// Run the network and decoder on a preprocessed `(B, 3, H, W)` batch.
    ///
    /// Returns decoded `(B, K, 3)` keypoints in heatmap coordinates, or the raw
    /// `(B, K, H/4, W/4)` heatmaps when the model was configured with
    /// `return_heatmap`.
    ///
    /// # Errors
    ///
    /// * [`InferenceError::ConfigError`] if the input does not have 3 channels.
    /// * [`InferenceError::InvalidShape`] if the network output is not a
    ///   `(B, K, H/4, W/4)` tensor matching this model.
    /// * Any error raised by the network, unchanged.
    pub fn infer(&mut self, images: &Array4<f32>) -> Result<PoseOutput> {
        let heatmaps = self.run_network(images)?;
        Ok(self.finish(heatmaps))
    }

    /// Run inference on an image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the image can't be loaded or inference fails.
    pub fn predict<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Results>> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| {
            InferenceError::ImageError(format!("Failed to load image {}: {e}", path.display()))
        })?;
        self.predict_image(&img, path.to_string_lossy().to_string())
    }

    /// Run inference on a `DynamicImage`.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn predict_image(&mut self, image: &DynamicImage, path: String) -> Result<Vec<Results>> {
        self.predict_batch(std::slice::from_ref(image), &[path])
    }

    /// Run inference on several images in one network call.
    ///
    /// Returns one [`Results`] per image, in input order. Missing paths are left empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `images` is empty or preprocessing or inference fails.
    pub fn predict_batch(&mut self, images: &[DynamicImage], paths: &[String]) -> Result<Vec<Results>> {
        if images.is_empty() {
            return Err(InferenceError::ConfigError("No images to process".to_string()));
        }
        if !self.warmed_up {
            self.warmup()?;
        }

        let start_preprocess = Instant::now();
        let prepared: Vec<PreprocessResult> = images
            .iter()
            .map(|img| preprocess_image(img, self.imgsz, false))
            .collect::<Result<_>>()?;
        let tensors: Vec<Array4<f32>> = prepared.iter().map(|p| p.tensor.clone()).collect();
        let batch = stack_batch(&tensors)?;
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let start_inference = Instant::now();
        let heatmaps = self.run_network(&batch)?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let output = self.finish(heatmaps);

        #[allow(clippy::cast_possible_truncation)]
        let inference_shape = (self.imgsz.0 as u32, self.imgsz.1 as u32);
        let mut results = Vec::with_capacity(images.len());
        for (i, (image, prep)) in images.iter().zip(&prepared).enumerate() {
            let path = paths.get(i).cloned().unwrap_or_default();
            let mut result = Results::new(
                image_to_array(image)?,
                path,
                self.names().clone(),
                Speed::default(),
                inference_shape,
            );
            match &output {
                PoseOutput::Keypoints(batch) => {
                    let data = scale_keypoints(&batch.item(i), prep.scale);
                    result.keypoints = Some(Keypoints::new(data, prep.orig_shape));
                }
                PoseOutput::Heatmap(tensor) => {
                    result.heatmap = Some(tensor.batch_item(i));
                }
            }
            results.push(result);
        }
        let postprocess_time = start_postprocess.elapsed().as_secs_f64() * 1000.0;

        #[allow(clippy::cast_precision_loss)]
        let n = images.len() as f64;
        let speed = Speed::new(preprocess_time / n, inference_time / n, postprocess_time / n);
        for result in &mut results {
            result.speed = speed.clone();
        }

        Ok(results)
    }

    /// Run the network and check its output against this model's geometry.
    fn run_network(&mut self, images: &Array4<f32>) -> Result<HeatmapTensor> {
        let (batch, channels, height, width) = images.dim();
        if channels != INPUT_CHANNELS {
            return Err(InferenceError::ConfigError(format!(
                "Expected {INPUT_CHANNELS} input channels, got {channels}"
            )));
        }

        let heatmaps = if self.config.half {
            self.network.forward_f16(&tensor_f32_to_f16(images))?
        } else {
            self.network.forward(images)?
        };

        let (hb, hk, hh, hw) = heatmaps.dims();
        let expected = heatmap_size((height, width));
        if hb != batch || hk != self.keypoints || (hh, hw) != expected {
            return Err(InferenceError::InvalidShape(format!(
                "network returned heatmaps {:?}, expected ({batch}, {}, {}, {})",
                heatmaps.dims(),
                self.keypoints,
                expected.0,
                expected.1
            )));
        }
        Ok(heatmaps)
    }

    fn finish(&self, heatmaps: HeatmapTensor) -> PoseOutput {
        if self.config.return_heatmap {
            PoseOutput::Heatmap(heatmaps)
        } else {
            PoseOutput::Keypoints(decode_heatmaps_with(&heatmaps, self.config.parallel_decode))
        }
    }

    /// Get the keypoint names.
    #[must_use]
    pub fn names(&self) -> &HashMap<usize, String> {
        &self.metadata.names
    }

    /// Number of keypoints the model predicts.
    #[must_use]
    pub const fn num_keypoints(&self) -> usize {
        self.keypoints
    }

    /// Network input size as (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }

    /// Heatmap size as (height, width).
    #[must_use]
    pub const fn heatmap_size(&self) -> (usize, usize) {
        heatmap_size(self.imgsz)
    }

    /// Get the model metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Get the inference configuration.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Borrow the underlying network.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }
}

impl<N: HeatmapNetwork> std::fmt::Debug for PoseModel<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseModel")
            .field("backbone", &self.metadata.backbone)
            .field("keypoints", &self.keypoints)
            .field("imgsz", &self.imgsz)
            .field("return_heatmap", &self.config.return_heatmap)
            .finish()
    }
}
