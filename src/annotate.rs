// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing decoded poses onto images.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::results::{Keypoints, Results};
use crate::visualizer::{Color, SKELETON};

/// Find the next available run directory (predict, predict2, predict3, etc.)
#[must_use]
pub fn find_next_run_dir(base: &str, prefix: &str) -> String {
    let base_path = Path::new(base);

    let first = base_path.join(prefix);
    if !first.exists() {
        return first.to_string_lossy().to_string();
    }

    (2..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|numbered| !numbered.exists())
        .unwrap_or(first)
        .to_string_lossy()
        .to_string()
}

/// Line width and dot radius scaled to the image size.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn stroke_sizes(width: u32, height: u32) -> (i32, i32) {
    let line = ((width + height) as f32 * 0.002).round().max(1.0) as i32;
    let radius = (line + 2).max(3);
    (line, radius)
}

/// Annotate an image with the skeleton and keypoints of `result`.
///
/// Keypoints whose score is not above `threshold` are not drawn, nor are limbs touching
/// them. Results without keypoints (raw heatmap mode) return an unmodified copy.
#[must_use]
pub fn annotate_image(image: &DynamicImage, result: &Results, threshold: f32) -> DynamicImage {
    let mut img = image.to_rgb8();
    if let Some(ref keypoints) = result.keypoints {
        draw_pose(&mut img, keypoints, threshold);
    }
    DynamicImage::ImageRgb8(img)
}

/// Draw one pose in place.
pub fn draw_pose(img: &mut RgbImage, keypoints: &Keypoints, threshold: f32) {
    let (width, height) = img.dimensions();
    let (line, radius) = stroke_sizes(width, height);
    let visible = keypoints.visible(threshold);
    let is_visible = |k: usize| visible.binary_search(&k).is_ok();
    let xy = keypoints.xy();

    for (limb, &[a, b]) in SKELETON.iter().enumerate() {
        if a >= keypoints.len() || b >= keypoints.len() || !is_visible(a) || !is_visible(b) {
            continue;
        }
        let color: Rgb<u8> = Color::limb(limb).into();
        let (start, end) = ((xy[[a, 0]], xy[[a, 1]]), (xy[[b, 0]], xy[[b, 1]]));
        #[allow(clippy::cast_precision_loss)]
        for t in 0..line {
            let offset = (t - line / 2) as f32;
            draw_line_segment_mut(img, (start.0 + offset, start.1), (end.0 + offset, end.1), color);
            draw_line_segment_mut(img, (start.0, start.1 + offset), (end.0, end.1 + offset), color);
        }
    }

    for &k in &visible {
        #[allow(clippy::cast_possible_truncation)]
        let center = (xy[[k, 0]].round() as i32, xy[[k, 1]].round() as i32);
        draw_filled_circle_mut(img, center, radius, Rgb::from(Color::keypoint(k)));
    }
}
