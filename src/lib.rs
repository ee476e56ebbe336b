// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # SimplePose Inference Library
//!
//! Single-person human keypoint estimation with SimplePose heatmap networks.
//!
//! A SimplePose network (a ResNet backbone, three stride-2 transposed-convolution
//! stages and a 1x1 keypoint head) maps an image batch `(B, 3, H, W)` to one heatmap
//! per keypoint at a quarter of the input resolution, `(B, K, H/4, W/4)`. This crate
//! runs the network through ONNX Runtime and decodes the heatmaps into
//! `(x, y, score)` keypoints.
//!
//! ## Features
//!
//! - **Heatmap decoding** - Per-channel argmax with quarter-pixel refinement toward the larger neighbour
//! - **ONNX Runtime** - Any exported SimplePose backbone (`ResNet18` through `ResNet152b`)
//! - **Pluggable networks** - Implement [`HeatmapNetwork`] to drive the decoder from any evaluator
//! - **Parallel decoding** - Keypoint channels are decoded with rayon
//! - **Multiple Backends** - CPU, CUDA, `TensorRT`, `CoreML`, `OpenVINO`
//! - **Multiple Sources** - Images, directories, glob patterns, in-memory buffers
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use simplepose_inference::PoseModel;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut model = PoseModel::load("simplepose_resnet18_coco.onnx")?;
//!     let results = model.predict("person.jpg")?;
//!
//!     for result in &results {
//!         if let Some(ref keypoints) = result.keypoints {
//!             for k in keypoints.visible(0.25) {
//!                 let xy = keypoints.xy();
//!                 println!("{} ({:.1}, {:.1})", result.keypoint_name(k), xy[[k, 0]], xy[[k, 1]]);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding Heatmaps Directly
//!
//! ```rust
//! use ndarray::Array4;
//! use simplepose_inference::{HeatmapTensor, decode_heatmaps};
//!
//! let mut data = Array4::<f32>::zeros((1, 1, 5, 5));
//! data[[0, 0, 2, 2]] = 5.0;
//! data[[0, 0, 2, 3]] = 4.0;
//! data[[0, 0, 2, 1]] = 1.0;
//!
//! let keypoints = decode_heatmaps(&HeatmapTensor::new(data).unwrap());
//! let kp = keypoints.record(0, 0);
//! assert_eq!((kp.x, kp.y, kp.score), (2.25, 2.0, 5.0));
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! simplepose predict --model simplepose_resnet18_coco.onnx --source person.jpg
//! simplepose predict -m model.onnx -s people/ --batch 4 --save
//! simplepose predict -m model.onnx -s person.jpg --heatmap
//! ```
//!
//! | Option | Short | Description | Default |
//! |--------|-------|-------------|---------|
//! | `--model` | `-m` | Path to ONNX model | required |
//! | `--source` | `-s` | Input source | required |
//! | `--imgsz` | | Network input size `H` or `H,W` | model metadata |
//! | `--keypoints` | | Expected keypoint count | model metadata |
//! | `--heatmap` | | Return raw heatmaps | `false` |
//! | `--conf` | | Keypoint score threshold | `0.25` |
//! | `--batch` | | Batch size | `1` |
//! | `--half` | | FP16 network input | `false` |
//! | `--device` | | Execution device | ONNX Runtime default |
//! | `--save` | | Save annotated images | `false` |
//!
//! ## Custom Configuration
//!
//! ```rust
//! use simplepose_inference::InferenceConfig;
//!
//! let config = InferenceConfig::new()
//!     .with_imgsz(384, 288)
//!     .with_keypoints(17)
//!     .with_return_heatmap(false);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | [`PoseModel`] for loading models and running inference |
//! | [`network`] | The [`HeatmapNetwork`] seam and its ONNX Runtime implementation |
//! | [`postprocessing`] | Heatmap-to-keypoint decoding |
//! | [`heatmap`] | The validated 4-D [`HeatmapTensor`] |
//! | [`results`] | Output types ([`Results`], [`Keypoints`], [`KeypointBatch`]) |
//! | [`architecture`] | Backbone variants and decoder geometry |
//! | [`inference`] | [`InferenceConfig`] |
//! | [`preprocessing`] | Resize and `ImageNet` normalization |
//! | [`metadata`] | ONNX model metadata parsing |
//! | [`source`] | Input source handling |
//! | [`error`] | Error types ([`InferenceError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Skeleton drawing and `--save` (default) |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `tensorrt` | NVIDIA `TensorRT` optimization |
//! | `coreml` | Apple `CoreML` (macOS/iOS) |
//! | `openvino` | Intel `OpenVINO` |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod architecture;
pub mod batch;
pub mod cli;
pub mod device;
pub mod error;
pub mod heatmap;
pub mod inference;
pub mod metadata;
pub mod model;
pub mod network;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod source;
pub mod visualizer;

// Re-export main types for convenience
pub use architecture::Backbone;
pub use device::Device;
pub use error::{InferenceError, Result};
pub use heatmap::HeatmapTensor;
pub use inference::InferenceConfig;
pub use model::PoseModel;
pub use network::{HeatmapNetwork, OnnxNetwork};
pub use postprocessing::decode_heatmaps;
pub use results::{KeypointBatch, KeypointRecord, Keypoints, PoseOutput, Results, Speed};
pub use source::{Source, SourceIterator, SourceMeta};

// Re-export metadata for advanced use
pub use metadata::ModelMetadata;

// Re-export preprocessing utilities
pub use preprocessing::{PreprocessResult, preprocess_image};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
