// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-keypoint heatmap tensors.
//!
//! A [`HeatmapTensor`] is the dense `(batch, keypoint, row, column)` output of the
//! keypoint head. Construction validates the shape once, so every consumer can index
//! the tensor without further bounds reasoning.

use ndarray::{Array3, Array4, ArrayD, ArrayView2, Axis, Ix4};

use crate::error::{InferenceError, Result};

/// Dense heatmap tensor with shape `(B, K, H, W)`.
///
/// Values are raw network outputs: they are neither required to be non-negative nor
/// normalized, and non-finite values are kept as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapTensor {
    data: Array4<f32>,
}

impl HeatmapTensor {
    /// Wrap a 4-D array, checking that no axis is empty.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidShape`] if the batch, keypoint or spatial
    /// dimension is zero.
    pub fn new(data: Array4<f32>) -> Result<Self> {
        validate_shape(data.shape())?;
        Ok(Self { data })
    }

    /// Build a tensor from a flat row-major buffer and a dynamic shape.
    ///
    /// This is how network outputs arrive (shape reported at runtime), so the rank is
    /// checked here before any indexing.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidShape`] if the shape is not 4-D, has an empty
    /// axis, or does not match the buffer length.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        validate_shape(shape)?;
        let dims = (shape[0], shape[1], shape[2], shape[3]);
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::InvalidShape(format!(
                "buffer holds {} values but shape {shape:?} needs {expected}",
                data.len()
            )));
        }
        let data = Array4::from_shape_vec(dims, data)
            .map_err(|e| InferenceError::InvalidShape(e.to_string()))?;
        Ok(Self { data })
    }

    /// Convert a dynamically-ranked array into a heatmap tensor.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::InvalidShape`] for any rank other than 4 or an empty
    /// axis.
    pub fn from_dyn(data: ArrayD<f32>) -> Result<Self> {
        validate_shape(data.shape())?;
        let data = data
            .into_dimensionality::<Ix4>()
            .map_err(|e| InferenceError::InvalidShape(e.to_string()))?;
        Ok(Self { data })
    }

    /// Batch size `B`.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.data.shape()[0]
    }

    /// Keypoint count `K`.
    #[must_use]
    pub fn keypoints(&self) -> usize {
        self.data.shape()[1]
    }

    /// Heatmap height `H`.
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.shape()[2]
    }

    /// Heatmap width `W`.
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.shape()[3]
    }

    /// Full shape as `(B, K, H, W)`.
    #[must_use]
    pub fn dims(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    /// The `H×W` map for one batch element and keypoint.
    ///
    /// # Panics
    ///
    /// Panics if `batch` or `keypoint` is out of range.
    #[must_use]
    pub fn slice(&self, batch: usize, keypoint: usize) -> ArrayView2<'_, f32> {
        self.data
            .index_axis(Axis(0), batch)
            .index_axis_move(Axis(0), keypoint)
    }

    /// All keypoint maps of one batch element as `(K, H, W)`.
    ///
    /// # Panics
    ///
    /// Panics if `batch` is out of range.
    #[must_use]
    pub fn batch_item(&self, batch: usize) -> Array3<f32> {
        self.data.index_axis(Axis(0), batch).to_owned()
    }

    /// Borrow the underlying array.
    #[must_use]
    pub const fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Consume the tensor and return the underlying array.
    #[must_use]
    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// Check rank and non-empty axes of a candidate heatmap shape.
fn validate_shape(shape: &[usize]) -> Result<()> {
    if shape.len() != 4 {
        return Err(InferenceError::InvalidShape(format!(
            "heatmap must be 4-D (batch, keypoint, height, width), got {} dims {shape:?}",
            shape.len()
        )));
    }
    let names = ["batch", "keypoint", "height", "width"];
    for (name, &dim) in names.iter().zip(shape) {
        if dim == 0 {
            return Err(InferenceError::InvalidShape(format!(
                "heatmap {name} dimension is zero in {shape:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_from_shape_vec() {
        let data: Vec<f32> = (0..2 * 3 * 4 * 5).map(|v| v as f32).collect();
        let tensor = HeatmapTensor::from_shape_vec(&[2, 3, 4, 5], data).unwrap();
        assert_eq!(tensor.dims(), (2, 3, 4, 5));
        assert_eq!(tensor.batch(), 2);
        assert_eq!(tensor.keypoints(), 3);
        assert_eq!(tensor.height(), 4);
        assert_eq!(tensor.width(), 5);

        // Row-major layout: slice (1, 2) starts at 1*60 + 2*20
        let hm = tensor.slice(1, 2);
        assert_eq!(hm[[0, 0]], 100.0);
        assert_eq!(hm[[3, 4]], 119.0);
    }

    #[test]
    fn test_rejects_wrong_rank() {
        let err = HeatmapTensor::from_shape_vec(&[17, 64, 48], vec![0.0; 17 * 64 * 48]).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidShape(_)));

        let err = HeatmapTensor::from_dyn(ArrayD::zeros(IxDyn(&[1, 2, 3, 4, 5]))).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidShape(_)));
    }

    #[test]
    fn test_rejects_empty_axes() {
        for shape in [[0, 17, 4, 4], [1, 0, 4, 4], [1, 17, 0, 4], [1, 17, 4, 0]] {
            let err = HeatmapTensor::new(Array4::zeros(shape)).unwrap_err();
            assert!(matches!(err, InferenceError::InvalidShape(_)), "{shape:?}");
        }
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = HeatmapTensor::from_shape_vec(&[1, 1, 4, 4], vec![0.0; 15]).unwrap_err();
        assert!(err.to_string().contains("needs 16"));
    }

    #[test]
    fn test_batch_item() {
        let mut data = Array4::zeros((2, 2, 3, 3));
        data[[1, 0, 2, 1]] = 7.0;
        let tensor = HeatmapTensor::new(data).unwrap();
        let item = tensor.batch_item(1);
        assert_eq!(item.shape(), &[2, 3, 3]);
        assert_eq!(item[[0, 2, 1]], 7.0);
    }
}
