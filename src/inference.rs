// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! This module defines the [`InferenceConfig`] struct, which controls how a pose model
//! is run: the network input size, the expected keypoint count, whether heatmaps are
//! decoded or returned raw, and the hardware execution options.

use crate::device::Device;

/// Configuration for pose inference.
///
/// This struct is used to customize the behavior of the inference engine.
/// It uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use simplepose_inference::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_imgsz(256, 192)
///     .with_keypoints(17)
///     .with_return_heatmap(false);
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Explicit network input size (height, width).
    /// If `None`, the model's metadata will be used to determine input size.
    pub imgsz: Option<(usize, usize)>,
    /// Expected number of keypoint heatmaps.
    /// If `None`, the model's metadata will be used.
    pub keypoints: Option<usize>,
    /// Return raw heatmaps instead of decoded keypoints.
    pub return_heatmap: bool,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose the optimal number.
    pub num_threads: usize,
    /// Whether to feed the network FP16 (half-precision) input.
    pub half: bool,
    /// Execution device. `None` keeps the ONNX Runtime default (CPU).
    pub device: Option<Device>,
    /// Number of images per inference call when processing sources.
    pub batch: usize,
    /// Decode heatmaps on the rayon thread pool.
    pub parallel_decode: bool,
    /// Minimum score for a keypoint to count as visible in summaries and annotations.
    /// Decoding itself is never thresholded.
    pub keypoint_threshold: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            imgsz: None,
            keypoints: None,
            return_heatmap: false,
            num_threads: 0, // 0 = let ONNX Runtime decide
            half: false,
            device: None,
            batch: 1,
            parallel_decode: true,
            keypoint_threshold: 0.25,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the network input size.
    ///
    /// Images are resized to exactly this size before inference; the heatmaps the
    /// network produces are a quarter of it on each axis.
    ///
    /// # Arguments
    ///
    /// * `height` - The target input height.
    /// * `width` - The target input width.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the expected keypoint count.
    #[must_use]
    pub const fn with_keypoints(mut self, keypoints: usize) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    /// Return raw heatmaps instead of decoded keypoints.
    #[must_use]
    pub const fn with_return_heatmap(mut self, return_heatmap: bool) -> Self {
        self.return_heatmap = return_heatmap;
        self
    }

    /// Set the number of threads for inference.
    ///
    /// # Arguments
    ///
    /// * `threads` - The number of intra-op threads. Set to `0` for auto-configuration.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Enable or disable FP16 (half-precision) input.
    ///
    /// Only useful for models exported with a float16 input.
    #[must_use]
    pub const fn with_half(mut self, half: bool) -> Self {
        self.half = half;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the batch size used when processing sources. Values below 1 are clamped to 1.
    #[must_use]
    pub const fn with_batch(mut self, batch: usize) -> Self {
        self.batch = if batch == 0 { 1 } else { batch };
        self
    }

    /// Enable or disable parallel heatmap decoding.
    #[must_use]
    pub const fn with_parallel_decode(mut self, parallel: bool) -> Self {
        self.parallel_decode = parallel;
        self
    }

    /// Set the keypoint visibility threshold.
    #[must_use]
    pub const fn with_keypoint_threshold(mut self, threshold: f32) -> Self {
        self.keypoint_threshold = threshold;
        self
    }
}
