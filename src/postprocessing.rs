// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Heatmap decoding.
//!
//! Turns a `(B, K, H, W)` heatmap tensor into one `[x, y, score]` record per batch
//! element and keypoint:
//!
//! 1. locate the peak with a row-major argmax (first maximum wins),
//! 2. split the flat index into `(col, row)`,
//! 3. zero the coordinate when the peak is not positive,
//! 4. nudge interior peaks a quarter pixel toward the higher neighbor on each axis.
//!
//! Non-finite values are not filtered. A NaN in a map is reported as its peak (so the
//! record becomes `(0, 0, NaN)`), and an infinite peak can turn the refinement offset
//! into NaN. Callers that need finite output must sanitize heatmaps themselves.

use ndarray::{Array3, ArrayView2};
use rayon::prelude::*;

use crate::heatmap::HeatmapTensor;
use crate::results::{KeypointBatch, KeypointRecord};

/// Sub-pixel step applied toward the higher neighbor.
pub const REFINE_OFFSET: f32 = 0.25;

/// Three-way sign: `1.0`, `-1.0`, or `0.0` for positive, negative, or zero input.
///
/// Both zeros map to `0.0`, and NaN maps to NaN.
#[must_use]
pub fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Flat index of the maximum of `hm` in row-major order.
///
/// Ties resolve to the first occurrence. A NaN counts as the maximum, and the first NaN
/// wins over any number. Returns `None` for an empty map.
#[must_use]
pub fn argmax_row_major(hm: &ArrayView2<'_, f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in hm.iter().enumerate() {
        if v.is_nan() {
            return Some(idx);
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Decode one `H×W` heatmap into a keypoint record.
///
/// An empty map yields `(0, 0, NaN)`; [`HeatmapTensor`] never holds one.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decode_slice(hm: &ArrayView2<'_, f32>) -> KeypointRecord {
    let (height, width) = hm.dim();
    let Some(idx) = argmax_row_major(hm) else {
        return KeypointRecord::new(0.0, 0.0, f32::NAN);
    };

    let col = idx % width;
    let row = idx / width;
    let score = hm[[row, col]];

    // NaN peaks fail this test too and are zeroed like non-positive ones.
    if score > 0.0 {
        let mut x = col as f32;
        let mut y = row as f32;

        // Strict interior only: col/row 1 are excluded as well as the border.
        if 1 < col && col + 1 < width && 1 < row && row + 1 < height {
            x += REFINE_OFFSET * sign(hm[[row, col + 1]] - hm[[row, col - 1]]);
            y += REFINE_OFFSET * sign(hm[[row + 1, col]] - hm[[row - 1, col]]);
        }
        KeypointRecord::new(x, y, score)
    } else {
        KeypointRecord::new(0.0, 0.0, score)
    }
}

/// Decode every `(batch, keypoint)` map sequentially.
#[must_use]
pub fn decode_heatmaps(heatmaps: &HeatmapTensor) -> KeypointBatch {
    let (b, k, _, _) = heatmaps.dims();
    let mut data = Array3::zeros((b, k, 3));
    for bi in 0..b {
        for ki in 0..k {
            let record = decode_slice(&heatmaps.slice(bi, ki));
            data[[bi, ki, 0]] = record.x;
            data[[bi, ki, 1]] = record.y;
            data[[bi, ki, 2]] = record.score;
        }
    }
    KeypointBatch::new(data)
}

/// Decode every `(batch, keypoint)` map on the rayon thread pool.
///
/// Output is identical to [`decode_heatmaps`]; slices are independent.
#[must_use]
pub fn decode_heatmaps_par(heatmaps: &HeatmapTensor) -> KeypointBatch {
    let (b, k, _, _) = heatmaps.dims();
    let records: Vec<KeypointRecord> = (0..b * k)
        .into_par_iter()
        .map(|i| decode_slice(&heatmaps.slice(i / k, i % k)))
        .collect();
    KeypointBatch::from_records(b, k, &records)
}

/// Decode sequentially or in parallel.
#[must_use]
pub fn decode_heatmaps_with(heatmaps: &HeatmapTensor, parallel: bool) -> KeypointBatch {
    if parallel {
        decode_heatmaps_par(heatmaps)
    } else {
        decode_heatmaps(heatmaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4, array};

    fn single(hm: Array2<f32>) -> HeatmapTensor {
        let (h, w) = hm.dim();
        HeatmapTensor::new(hm.into_shape_with_order((1, 1, h, w)).unwrap()).unwrap()
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(2.5), 1.0);
        assert_eq!(sign(-0.1), -1.0);
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(f32::INFINITY), 1.0);
        assert!(sign(f32::NAN).is_nan());
    }

    #[test]
    fn test_argmax_first_occurrence() {
        let hm = array![[0.0, 3.0, 1.0], [3.0, 2.0, 3.0]];
        assert_eq!(argmax_row_major(&hm.view()), Some(1));

        let flat = Array2::<f32>::from_elem((4, 4), 1.0);
        assert_eq!(argmax_row_major(&flat.view()), Some(0));

        let negative = array![[-5.0, -2.0], [-2.0, -9.0]];
        assert_eq!(argmax_row_major(&negative.view()), Some(1));
    }

    #[test]
    fn test_argmax_nan_wins() {
        let hm = array![[1.0, 9.0], [f32::NAN, f32::NAN]];
        assert_eq!(argmax_row_major(&hm.view()), Some(2));
    }

    #[test]
    fn test_argmax_empty() {
        let hm = Array2::<f32>::zeros((0, 3));
        assert_eq!(argmax_row_major(&hm.view()), None);
    }

    #[test]
    fn test_flat_positive_map_picks_origin() {
        let hm = Array2::from_elem((4, 4), 1.0);
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_refinement_direction() {
        let mut hm = Array2::zeros((5, 5));
        hm[[2, 2]] = 5.0;
        hm[[2, 3]] = 3.0;
        hm[[2, 1]] = 1.0;
        hm[[1, 2]] = 1.0;
        hm[[3, 2]] = 1.0;
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(2.25, 2.0, 5.0));
    }

    #[test]
    fn test_refinement_toward_lower_neighbors() {
        let mut hm = Array2::zeros((6, 6));
        hm[[3, 3]] = 4.0;
        hm[[3, 2]] = 2.0; // left higher
        hm[[2, 3]] = 2.0; // up higher
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(2.75, 2.75, 4.0));
    }

    #[test]
    fn test_no_refinement_at_edge() {
        let mut hm = Array2::zeros((4, 4));
        hm[[0, 3]] = 2.0;
        hm[[0, 2]] = 1.0;
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(3.0, 0.0, 2.0));
    }

    #[test]
    fn test_no_refinement_at_index_one() {
        // col == 1 and row == 1 are outside the strict interior
        let mut hm = Array2::zeros((5, 5));
        hm[[1, 1]] = 3.0;
        hm[[1, 2]] = 2.0;
        hm[[2, 1]] = 2.0;
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(1.0, 1.0, 3.0));

        let mut hm = Array2::zeros((5, 5));
        hm[[2, 1]] = 3.0;
        hm[[3, 1]] = 1.0;
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_small_maps_skip_refinement() {
        let hm = array![[0.0, 1.0], [0.5, 0.2]];
        assert_eq!(decode_slice(&hm.view()), KeypointRecord::new(1.0, 0.0, 1.0));

        let hm = array![[0.1, 0.2, 0.9]];
        assert_eq!(decode_slice(&hm.view()), KeypointRecord::new(2.0, 0.0, 0.9));
    }

    #[test]
    fn test_gating_zeroes_non_positive_peaks() {
        let mut hm = Array2::from_elem((5, 5), -3.0);
        hm[[3, 2]] = -0.5;
        assert_eq!(decode_slice(&hm.view()), KeypointRecord::new(0.0, 0.0, -0.5));

        let hm = Array2::<f32>::zeros((5, 5));
        assert_eq!(decode_slice(&hm.view()), KeypointRecord::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_nan_passes_through() {
        let mut hm = Array2::zeros((5, 5));
        hm[[2, 2]] = 7.0;
        hm[[4, 4]] = f32::NAN;
        let record = decode_slice(&hm.view());
        assert_eq!((record.x, record.y), (0.0, 0.0));
        assert!(record.score.is_nan());
    }

    #[test]
    fn test_infinite_peak_refines_toward_infinite_neighbor() {
        let mut hm = Array2::zeros((5, 5));
        hm[[2, 2]] = f32::INFINITY;
        hm[[2, 3]] = f32::INFINITY;
        // First +inf in row-major order is (2, 2); right neighbor inf, left 0.
        let record = decode_slice(&hm.view());
        assert_eq!(record, KeypointRecord::new(2.25, 2.0, f32::INFINITY));
    }

    #[test]
    fn test_nan_refinement_offset() {
        let mut hm = Array2::zeros((5, 5));
        hm[[2, 2]] = f32::INFINITY;
        hm[[1, 2]] = f32::NEG_INFINITY;
        hm[[3, 2]] = f32::NEG_INFINITY;
        // -inf - -inf is NaN, and sign(NaN) carries it into y
        let record = decode_slice(&hm.view());
        assert_eq!(record.x, 2.0);
        assert!(record.y.is_nan());
        assert_eq!(record.score, f32::INFINITY);
    }

    #[test]
    fn test_decode_batch_layout() {
        let mut data = Array4::zeros((2, 3, 6, 5));
        data[[0, 0, 3, 2]] = 1.0;
        data[[1, 2, 0, 4]] = 2.0;
        data[[1, 1, 4, 3]] = -1.0;
        let tensor = HeatmapTensor::new(data).unwrap();

        let batch = decode_heatmaps(&tensor);
        assert_eq!(batch.shape(), (2, 3, 3));
        assert_eq!(batch.record(0, 0), KeypointRecord::new(2.0, 3.0, 1.0));
        assert_eq!(batch.record(1, 2), KeypointRecord::new(4.0, 0.0, 2.0));
        // all-zero / negative maps are gated
        assert_eq!(batch.record(0, 1), KeypointRecord::new(0.0, 0.0, 0.0));
        assert_eq!(batch.record(1, 1), KeypointRecord::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (b, k, h, w) = (3, 17, 16, 12);
        #[allow(clippy::cast_precision_loss)]
        let data = Array4::from_shape_fn((b, k, h, w), |(bi, ki, r, c)| {
            // deterministic pseudo-random values with both signs
            let seed = (bi * 7919 + ki * 104_729 + r * 31 + c * 17) % 1000;
            seed as f32 / 500.0 - 0.6
        });
        let tensor = HeatmapTensor::new(data).unwrap();

        let seq = decode_heatmaps(&tensor);
        let par = decode_heatmaps_par(&tensor);
        assert_eq!(seq, par);
        assert_eq!(decode_heatmaps_with(&tensor, true), decode_heatmaps(&tensor));

        for record in seq.records() {
            if record.score <= 0.0 {
                assert_eq!((record.x, record.y), (0.0, 0.0));
            }
        }
    }

    #[test]
    fn test_single_helper() {
        let tensor = single(array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        let batch = decode_heatmaps(&tensor);
        // (1, 1) is not in the strict interior
        assert_eq!(batch.record(0, 0), KeypointRecord::new(1.0, 1.0, 1.0));
    }
}
