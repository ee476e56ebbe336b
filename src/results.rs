// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Result types for pose inference output.
//!
//! [`KeypointBatch`] is the direct output of heatmap decoding in heatmap-resolution
//! space. [`Results`] is the per-image view handed to applications, with keypoints
//! mapped back onto the original image.

use std::collections::HashMap;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, s};

use crate::heatmap::HeatmapTensor;

/// Timing information for inference operations (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    ///
    /// # Arguments
    ///
    /// * `preprocess` - Time in milliseconds.
    /// * `inference` - Time in milliseconds.
    /// * `postprocess` - Time in milliseconds.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of preprocess, inference, and postprocess times in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// One decoded keypoint.
///
/// `x` and `y` are in heatmap pixels unless the caller rescales them. `score` is the raw
/// heatmap peak. A non-positive score always comes with `x == 0.0 && y == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointRecord {
    /// Column coordinate.
    pub x: f32,
    /// Row coordinate.
    pub y: f32,
    /// Peak heatmap value.
    pub score: f32,
}

impl KeypointRecord {
    /// Create a record.
    #[must_use]
    pub const fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// The record as `[x, y, score]`.
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.score]
    }
}

/// Decoded keypoints for a whole batch, shape `(B, K, 3)` with `[x, y, score]` per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointBatch {
    data: Array3<f32>,
}

impl KeypointBatch {
    /// Wrap a `(B, K, 3)` array.
    ///
    /// # Panics
    ///
    /// Panics if the last axis is not of length 3.
    #[must_use]
    pub fn new(data: Array3<f32>) -> Self {
        assert_eq!(data.shape()[2], 3, "keypoint records must be [x, y, score]");
        Self { data }
    }

    /// Build a batch from records laid out batch-major, then keypoint-major.
    ///
    /// # Panics
    ///
    /// Panics if `records.len() != batch * keypoints`.
    #[must_use]
    pub fn from_records(batch: usize, keypoints: usize, records: &[KeypointRecord]) -> Self {
        assert_eq!(records.len(), batch * keypoints);
        let mut data = Array3::zeros((batch, keypoints, 3));
        for (i, record) in records.iter().enumerate() {
            let (b, k) = (i / keypoints, i % keypoints);
            data[[b, k, 0]] = record.x;
            data[[b, k, 1]] = record.y;
            data[[b, k, 2]] = record.score;
        }
        Self { data }
    }

    /// Shape as `(B, K, 3)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Batch size.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.data.shape()[0]
    }

    /// Keypoints per batch element.
    #[must_use]
    pub fn keypoints(&self) -> usize {
        self.data.shape()[1]
    }

    /// Record for batch element `b`, keypoint `k`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn record(&self, b: usize, k: usize) -> KeypointRecord {
        KeypointRecord::new(self.data[[b, k, 0]], self.data[[b, k, 1]], self.data[[b, k, 2]])
    }

    /// All records in batch-major, keypoint-major order.
    #[must_use]
    pub fn records(&self) -> Vec<KeypointRecord> {
        self.data
            .outer_iter()
            .flat_map(|item| {
                item.outer_iter()
                    .map(|r| KeypointRecord::new(r[0], r[1], r[2]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// `(K, 3)` rows of one batch element.
    ///
    /// # Panics
    ///
    /// Panics if `b` is out of range.
    #[must_use]
    pub fn item(&self, b: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), b)
    }

    /// Coordinates only, shape `(B, K, 2)`.
    #[must_use]
    pub fn xy(&self) -> ArrayView3<'_, f32> {
        self.data.slice(s![.., .., 0..2])
    }

    /// Scores only, shape `(B, K)`.
    #[must_use]
    pub fn scores(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., .., 2])
    }

    /// Borrow the raw `(B, K, 3)` array.
    #[must_use]
    pub const fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Consume and return the raw array.
    #[must_use]
    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }
}

/// What an inference call returns, fixed by the model's `return_heatmap` option.
#[derive(Debug, Clone)]
pub enum PoseOutput {
    /// Decoded keypoints.
    Keypoints(KeypointBatch),
    /// Undecoded heatmaps.
    Heatmap(HeatmapTensor),
}

impl PoseOutput {
    /// The decoded keypoints, if this is a keypoint output.
    #[must_use]
    pub const fn keypoints(&self) -> Option<&KeypointBatch> {
        match self {
            Self::Keypoints(k) => Some(k),
            Self::Heatmap(_) => None,
        }
    }

    /// The raw heatmaps, if this is a heatmap output.
    #[must_use]
    pub const fn heatmap(&self) -> Option<&HeatmapTensor> {
        match self {
            Self::Heatmap(h) => Some(h),
            Self::Keypoints(_) => None,
        }
    }

    /// Batch size of either variant.
    #[must_use]
    pub fn batch(&self) -> usize {
        match self {
            Self::Keypoints(k) => k.batch(),
            Self::Heatmap(h) => h.batch(),
        }
    }
}

/// Keypoints for one image in original-image pixel coordinates.
#[derive(Debug, Clone)]
pub struct Keypoints {
    /// Keypoint data with shape (K, 3): `[x, y, score]`.
    pub data: Array2<f32>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
}

impl Keypoints {
    /// Create a new Keypoints instance.
    #[must_use]
    pub fn new(data: Array2<f32>, orig_shape: (u32, u32)) -> Self {
        Self { data, orig_shape }
    }

    /// Number of keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Check if there are no keypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get xy coordinates, shape (K, 2).
    #[must_use]
    pub fn xy(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., 0..2])
    }

    /// Get xy coordinates normalized by the original image size.
    #[must_use]
    pub fn xyn(&self) -> Array2<f32> {
        let mut xyn = self.xy().to_owned();
        #[allow(clippy::cast_precision_loss)]
        let (h, w) = (self.orig_shape.0 as f32, self.orig_shape.1 as f32);
        xyn.column_mut(0).mapv_inplace(|v| v / w);
        xyn.column_mut(1).mapv_inplace(|v| v / h);
        xyn
    }

    /// Peak scores, shape (K,).
    #[must_use]
    pub fn conf(&self) -> ArrayView1<'_, f32> {
        self.data.column(2)
    }

    /// Indices of keypoints whose score is strictly above `threshold`.
    ///
    /// NaN scores are never visible.
    #[must_use]
    pub fn visible(&self, threshold: f32) -> Vec<usize> {
        self.conf()
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score > threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Results container for one image.
#[derive(Debug, Clone)]
pub struct Results {
    /// Original image as HWC array (height, width, channels).
    pub orig_img: Array3<u8>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Network input shape (height, width).
    pub inference_shape: (u32, u32),
    /// Decoded keypoints, when the model decodes heatmaps.
    pub keypoints: Option<Keypoints>,
    /// Raw `(K, H, W)` heatmaps, when the model returns heatmaps.
    pub heatmap: Option<Array3<f32>>,
    /// Inference timing information.
    pub speed: Speed,
    /// Keypoint index to name mapping.
    pub names: HashMap<usize, String>,
    /// Path to the source image.
    pub path: String,
}

impl Results {
    /// Create a new Results instance with no outputs attached.
    #[must_use]
    pub fn new(
        orig_img: Array3<u8>,
        path: String,
        names: HashMap<usize, String>,
        speed: Speed,
        inference_shape: (u32, u32),
    ) -> Self {
        let shape = orig_img.shape();
        #[allow(clippy::cast_possible_truncation)]
        let orig_shape = (shape[0] as u32, shape[1] as u32);

        Self {
            orig_img,
            orig_shape,
            inference_shape,
            keypoints: None,
            heatmap: None,
            speed,
            names,
            path,
        }
    }

    /// Number of keypoints (or heatmap channels) in this result.
    #[must_use]
    pub fn len(&self) -> usize {
        if let Some(ref keypoints) = self.keypoints {
            return keypoints.len();
        }
        self.heatmap.as_ref().map_or(0, |h| h.shape()[0])
    }

    /// Check if the result holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of a keypoint, falling back to its index.
    #[must_use]
    pub fn keypoint_name(&self, index: usize) -> String {
        self.names
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("kpt{index}"))
    }

    /// One-line summary, e.g. `"17 keypoints (15 confident)"`.
    #[must_use]
    pub fn verbose(&self) -> String {
        if let Some(ref keypoints) = self.keypoints {
            let confident = keypoints.visible(0.0).len();
            return format!("{} keypoints ({confident} confident)", keypoints.len());
        }
        if let Some(ref heatmap) = self.heatmap {
            let (k, h, w) = heatmap.dim();
            return format!("{k} heatmaps {h}x{w}");
        }
        "(no detections)".to_string()
    }
}
