// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for pose inference.
//!
//! Images are resized straight to the network input size (no letterbox), converted to
//! RGB, scaled to [0, 1] and normalized with the ImageNet statistics the backbones were
//! trained with. The per-axis resize factors are kept so decoded keypoints can be mapped
//! back onto the original image.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::similar_names
)]

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use half::f16;
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView4, Axis, concatenate};

use crate::architecture::HEATMAP_STRIDE;
use crate::error::{InferenceError, Result};

/// Per-channel RGB mean of the ImageNet training set.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel RGB standard deviation of the ImageNet training set.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Result of preprocessing an image, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Normalized image tensor in NCHW format with shape `(1, 3, H, W)`.
    pub tensor: Array4<f32>,
    /// FP16 copy of `tensor` (if requested).
    pub tensor_f16: Option<Array4<f16>>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied by the resize (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
}

/// Preprocess an image for pose inference.
///
/// # Arguments
///
/// * `image` - Input image.
/// * `target_size` - Network input size as (height, width).
/// * `half` - If true, also generate an FP16 tensor.
///
/// # Errors
///
/// Returns [`InferenceError::ImageError`] if the image is empty or cannot be resized.
pub fn preprocess_image(
    image: &DynamicImage,
    target_size: (usize, usize),
    half: bool,
) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(InferenceError::ImageError("Image has zero size".to_string()));
    }

    let resized = resize_image(image, target_size)?;
    let tensor = image_to_tensor(&resized)?;
    let tensor_f16 = half.then(|| tensor_f32_to_f16(&tensor));

    let scale = (
        target_size.0 as f32 / orig_height as f32,
        target_size.1 as f32 / orig_width as f32,
    );

    Ok(PreprocessResult {
        tensor,
        tensor_f16,
        orig_shape: (orig_height, orig_width),
        scale,
    })
}

/// Resize an image to exactly `target_size` (height, width) with bilinear filtering.
fn resize_image(image: &DynamicImage, target_size: (usize, usize)) -> Result<RgbImage> {
    let (src_w, src_h) = image.dimensions();
    let dst_h = u32::try_from(target_size.0)
        .map_err(|_| InferenceError::ConfigError(format!("Input height {} too large", target_size.0)))?;
    let dst_w = u32::try_from(target_size.1)
        .map_err(|_| InferenceError::ConfigError(format!("Input width {} too large", target_size.1)))?;

    let src_rgb = image.to_rgb8();
    if (src_w, src_h) == (dst_w, dst_h) {
        return Ok(src_rgb);
    }

    let src_image = Image::from_vec_u8(src_w, src_h, src_rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| InferenceError::ImageError(format!("Failed to create source image: {e}")))?;
    let mut dst_image = Image::new(dst_w, dst_h, PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| InferenceError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(dst_w, dst_h, dst_image.into_vec())
        .ok_or_else(|| InferenceError::ImageError("Failed to create resized buffer".to_string()))
}

/// Convert an RGB image to an ImageNet-normalized NCHW tensor with shape `(1, 3, H, W)`.
fn image_to_tensor(image: &RgbImage) -> Result<Array4<f32>> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let plane = h * w;

    let scale: [f32; 3] = std::array::from_fn(|c| 1.0 / (255.0 * IMAGENET_STD[c]));
    let shift: [f32; 3] = std::array::from_fn(|c| IMAGENET_MEAN[c] / IMAGENET_STD[c]);

    let mut data = vec![0.0_f32; 3 * plane];
    let (r_slice, rest) = data.split_at_mut(plane);
    let (g_slice, b_slice) = rest.split_at_mut(plane);

    for (i, chunk) in image.as_raw().chunks_exact(3).enumerate() {
        r_slice[i] = f32::from(chunk[0]).mul_add(scale[0], -shift[0]);
        g_slice[i] = f32::from(chunk[1]).mul_add(scale[1], -shift[1]);
        b_slice[i] = f32::from(chunk[2]).mul_add(scale[2], -shift[2]);
    }

    Array4::from_shape_vec((1, 3, h, w), data)
        .map_err(|e| InferenceError::ImageError(format!("Failed to build input tensor: {e}")))
}

/// Convert f32 tensor to f16 tensor.
#[must_use]
pub fn tensor_f32_to_f16(tensor: &Array4<f32>) -> Array4<f16> {
    tensor.mapv(f16::from_f32)
}

/// Concatenate per-image `(1, C, H, W)` tensors into one `(N, C, H, W)` batch.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidShape`] if `tensors` is empty or the tensors
/// disagree on channel or spatial size.
pub fn stack_batch<T: Clone>(tensors: &[Array4<T>]) -> Result<Array4<T>> {
    if tensors.is_empty() {
        return Err(InferenceError::InvalidShape("Cannot stack an empty batch".to_string()));
    }
    let views: Vec<ArrayView4<'_, T>> = tensors.iter().map(Array4::view).collect();
    concatenate(Axis(0), &views)
        .map_err(|e| InferenceError::InvalidShape(format!("Cannot stack batch: {e}")))
}

/// Map decoded `(K, 3)` keypoints from heatmap cells to original-image pixels.
///
/// `x_img = x * HEATMAP_STRIDE / scale_x`, likewise for y. Scores are copied unchanged,
/// and zeroed keypoints stay at the origin.
#[must_use]
pub fn scale_keypoints(keypoints: &ArrayView2<'_, f32>, scale: (f32, f32)) -> Array2<f32> {
    let (scale_y, scale_x) = scale;
    let stride = HEATMAP_STRIDE as f32;
    let mut out = keypoints.to_owned();
    for mut row in out.rows_mut() {
        row[0] = row[0] * stride / scale_x;
        row[1] = row[1] * stride / scale_y;
    }
    out
}

/// Convert a `DynamicImage` to an HWC ndarray.
///
/// # Errors
///
/// Returns [`InferenceError::ImageError`] if the pixel buffer does not match the
/// image dimensions.
pub fn image_to_array(image: &DynamicImage) -> Result<Array3<u8>> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.into_raw();

    Array3::from_shape_vec((height as usize, width as usize, 3), pixels)
        .map_err(|e| InferenceError::ImageError(format!("Failed to create array from image: {e}")))
}

/// Convert an HWC ndarray back into a `DynamicImage`.
///
/// # Errors
///
/// Returns [`InferenceError::ImageError`] if the array is not `(H, W, 3)`.
pub fn array_to_image(array: &Array3<u8>) -> Result<DynamicImage> {
    let (height, width, channels) = array.dim();
    if channels != 3 {
        return Err(InferenceError::ImageError(format!(
            "Expected 3 channels, got {channels}"
        )));
    }
    let raw: Vec<u8> = array.iter().copied().collect();
    RgbImage::from_raw(width as u32, height as u32, raw)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| InferenceError::ImageError("Failed to create image buffer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::array;

    #[test]
    fn test_preprocess_shape_and_scale() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 128, Rgb([10, 20, 30])));
        let result = preprocess_image(&img, (256, 192), true).unwrap();

        assert_eq!(result.tensor.shape(), &[1, 3, 256, 192]);
        assert_eq!(result.tensor_f16.as_ref().unwrap().shape(), &[1, 3, 256, 192]);
        assert_eq!(result.orig_shape, (128, 96));
        assert!((result.scale.0 - 2.0).abs() < 1e-6);
        assert!((result.scale.1 - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_imagenet_normalization() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 128])));
        let result = preprocess_image(&img, (8, 8), false).unwrap();
        let t = &result.tensor;

        let r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let b = (128.0 / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((t[[0, 0, 3, 3]] - r).abs() < 1e-4);
        assert!((t[[0, 1, 0, 7]] - g).abs() < 1e-4);
        assert!((t[[0, 2, 7, 0]] - b).abs() < 1e-4);
        assert!(result.tensor_f16.is_none());
    }

    #[test]
    fn test_stack_batch() {
        let a = Array4::<f32>::zeros((1, 3, 8, 4));
        let b = Array4::<f32>::ones((1, 3, 8, 4));
        let batch = stack_batch(&[a, b]).unwrap();
        assert_eq!(batch.shape(), &[2, 3, 8, 4]);
        assert_eq!(batch[[1, 2, 7, 3]], 1.0);

        assert!(stack_batch::<f32>(&[]).is_err());
        let c = Array4::<f32>::zeros((1, 3, 4, 4));
        assert!(stack_batch(&[Array4::<f32>::zeros((1, 3, 8, 4)), c]).is_err());
    }

    #[test]
    fn test_scale_keypoints() {
        let kpts = array![[2.25, 2.0, 5.0], [0.0, 0.0, -1.0]];
        // 256x192 input from a 512x384 image
        let scaled = scale_keypoints(&kpts.view(), (0.5, 0.5));
        assert!((scaled[[0, 0]] - 18.0).abs() < 1e-6);
        assert!((scaled[[0, 1]] - 16.0).abs() < 1e-6);
        assert_eq!(scaled[[0, 2]], 5.0);
        assert_eq!(scaled[[1, 0]], 0.0);
        assert_eq!(scaled[[1, 1]], 0.0);
    }

    #[test]
    fn test_image_array_roundtrip() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 3, Rgb([1, 2, 3])));
        let arr = image_to_array(&img).unwrap();
        assert_eq!(arr.shape(), &[3, 5, 3]);
        let back = array_to_image(&arr).unwrap();
        assert_eq!(back.dimensions(), (5, 3));
        assert!(array_to_image(&Array3::zeros((2, 2, 4))).is_err());
    }
}
