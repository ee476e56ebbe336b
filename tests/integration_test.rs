// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests driving the decoder and model through a synthetic network.

use image::DynamicImage;
use ndarray::{Array2, Array4};
use simplepose_inference::postprocessing::decode_heatmaps_with;
use simplepose_inference::{
    HeatmapNetwork, HeatmapTensor, InferenceConfig, InferenceError, KeypointRecord, PoseModel,
    PoseOutput, Result, decode_heatmaps,
};

/// Network emitting a single interior peak of 10.0 per channel, at a channel-dependent spot.
struct SyntheticPeaks {
    keypoints: usize,
}

fn peak_position(k: usize, height: usize, width: usize) -> (usize, usize) {
    (2 + (3 * k) % (height - 4), 2 + (5 * k) % (width - 4))
}

impl HeatmapNetwork for SyntheticPeaks {
    fn forward(&mut self, input: &Array4<f32>) -> Result<HeatmapTensor> {
        let (b, _, h, w) = input.dim();
        let (hh, hw) = (h / 4, w / 4);
        let mut data = Array4::zeros((b, self.keypoints, hh, hw));
        for bi in 0..b {
            for k in 0..self.keypoints {
                let (row, col) = peak_position(k, hh, hw);
                data[[bi, k, row, col]] = 10.0;
            }
        }
        HeatmapTensor::new(data)
    }
}

/// Network that always fails, standing in for a broken evaluator.
struct Broken;

impl HeatmapNetwork for Broken {
    fn forward(&mut self, _input: &Array4<f32>) -> Result<HeatmapTensor> {
        Err(InferenceError::InferenceError("backbone exploded".to_string()))
    }
}

fn single(hm: Array2<f32>) -> HeatmapTensor {
    let (h, w) = hm.dim();
    HeatmapTensor::new(hm.into_shape_with_order((1, 1, h, w)).unwrap()).unwrap()
}

#[test]
fn test_end_to_end_batch_of_two() {
    let config = InferenceConfig::new().with_imgsz(256, 192);
    let mut model = PoseModel::from_network(SyntheticPeaks { keypoints: 17 }, config).unwrap();

    let output = model.infer(&Array4::zeros((2, 3, 256, 192))).unwrap();
    let PoseOutput::Keypoints(batch) = output else {
        panic!("expected decoded keypoints");
    };

    assert_eq!(batch.shape(), (2, 17, 3));
    for b in 0..2 {
        for k in 0..17 {
            let (row, col) = peak_position(k, 64, 48);
            #[allow(clippy::cast_precision_loss)]
            let expected = KeypointRecord::new(col as f32, row as f32, 10.0);
            assert_eq!(batch.record(b, k), expected);
        }
    }
    assert!(batch.records().iter().all(|r| !r.x.is_nan() && !r.y.is_nan() && !r.score.is_nan()));
}

#[test]
fn test_raw_heatmap_mode() {
    let config = InferenceConfig::new().with_imgsz(64, 48).with_return_heatmap(true);
    let mut model = PoseModel::from_network(SyntheticPeaks { keypoints: 17 }, config).unwrap();

    let output = model.infer(&Array4::zeros((1, 3, 64, 48))).unwrap();
    let PoseOutput::Heatmap(heatmaps) = output else {
        panic!("expected raw heatmaps");
    };
    assert_eq!(heatmaps.dims(), (1, 17, 16, 12));
}

#[test]
fn test_predict_image_in_pixels() {
    let config = InferenceConfig::new().with_imgsz(64, 48).with_keypoints(1);
    let mut model = PoseModel::from_network(SyntheticPeaks { keypoints: 1 }, config).unwrap();

    // A 96x128 (w x h) image is scaled by 0.5 on both axes to the 48x64 input.
    let results = model
        .predict_image(&DynamicImage::new_rgb8(96, 128), "person.jpg".to_string())
        .unwrap();
    assert_eq!(results.len(), 1);

    let keypoints = results[0].keypoints.as_ref().unwrap();
    assert_eq!(keypoints.orig_shape, (128, 96));
    // Channel 0 peaks at heatmap (row 2, col 2): 2 * 4 / 0.5 = 16 pixels.
    assert!((keypoints.data[[0, 0]] - 16.0).abs() < 1e-4);
    assert!((keypoints.data[[0, 1]] - 16.0).abs() < 1e-4);
    assert!((keypoints.data[[0, 2]] - 10.0).abs() < 1e-6);
}

#[test]
fn test_network_errors_pass_through() {
    let config = InferenceConfig::new().with_imgsz(64, 48);
    let mut model = PoseModel::from_network(Broken, config).unwrap();

    let err = model.infer(&Array4::zeros((1, 3, 64, 48))).unwrap_err();
    match err {
        InferenceError::InferenceError(msg) => assert_eq!(msg, "backbone exploded"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_three_dimensional_tensor_rejected() {
    let err = HeatmapTensor::from_shape_vec(&[17, 64, 48], vec![0.0; 17 * 64 * 48]).unwrap_err();
    assert!(matches!(err, InferenceError::InvalidShape(_)));
}

#[test]
fn test_interior_peak_refinement() {
    let mut hm = Array2::zeros((5, 5));
    hm[[2, 2]] = 5.0;
    hm[[2, 3]] = 3.0;
    hm[[2, 1]] = 1.0;
    hm[[1, 2]] = 1.0;
    hm[[3, 2]] = 1.0;

    let batch = decode_heatmaps(&single(hm));
    assert_eq!(batch.record(0, 0), KeypointRecord::new(2.25, 2.0, 5.0));
}

#[test]
fn test_flat_map_takes_first_position() {
    let batch = decode_heatmaps(&single(Array2::from_elem((4, 4), 1.0)));
    assert_eq!(batch.record(0, 0), KeypointRecord::new(0.0, 0.0, 1.0));
}

#[test]
fn test_edge_peak_not_refined() {
    let mut hm = Array2::zeros((4, 4));
    hm[[0, 3]] = 2.0;
    hm[[0, 2]] = 1.0;
    hm[[1, 3]] = 1.5;

    let batch = decode_heatmaps(&single(hm));
    assert_eq!(batch.record(0, 0), KeypointRecord::new(3.0, 0.0, 2.0));
}

#[test]
fn test_non_positive_peak_zeroes_coordinates() {
    let batch = decode_heatmaps(&single(Array2::from_elem((6, 6), -0.5)));
    assert_eq!(batch.record(0, 0), KeypointRecord::new(0.0, 0.0, -0.5));
}

#[test]
fn test_parallel_matches_sequential() {
    #[allow(clippy::cast_precision_loss)]
    let data = Array4::from_shape_fn((3, 17, 16, 12), |(b, k, r, c)| {
        ((b * 31 + k * 17 + r * 7 + c * 3) % 23) as f32 - 4.0
    });
    let heatmaps = HeatmapTensor::new(data).unwrap();

    let sequential = decode_heatmaps_with(&heatmaps, false);
    let parallel = decode_heatmaps_with(&heatmaps, true);
    assert_eq!(sequential, parallel);
    assert_eq!(decode_heatmaps(&heatmaps), sequential);
}
