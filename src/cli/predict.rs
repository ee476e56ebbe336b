// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

#[cfg(feature = "annotate")]
use std::fs;
#[cfg(feature = "annotate")]
use std::path::{Path, PathBuf};

#[cfg(feature = "annotate")]
use crate::annotate::{annotate_image, find_next_run_dir};

use crate::batch::BatchProcessor;
use crate::cli::args::PredictArgs;
use crate::source::{Source, SourceIterator, SourceMeta};
use crate::{InferenceConfig, PoseModel, Results, VERSION};
use crate::{error, info, section, success, verbose, warn};

/// Run SimplePose keypoint estimation over a source.
#[allow(
    clippy::too_many_lines,
    clippy::cast_precision_loss,
    clippy::missing_panics_doc
)]
pub fn run_prediction(args: &PredictArgs) {
    let mut config = InferenceConfig::new()
        .with_half(args.half)
        .with_batch(args.batch)
        .with_return_heatmap(args.heatmap)
        .with_keypoint_threshold(args.conf);
    if let Some((h, w)) = args.imgsz {
        config = config.with_imgsz(h, w);
    }
    if let Some(k) = args.keypoints {
        config = config.with_keypoints(k);
    }
    if let Some(device) = args.device {
        config = config.with_device(device);
    }
    let batch_size = config.batch;

    let mut model = match PoseModel::load_with_config(&args.model, config) {
        Ok(m) => m,
        Err(e) => {
            error!("Error loading model: {e}");
            process::exit(1);
        }
    };

    let precision = if args.half { "FP16" } else { "FP32" };
    let device = args.device.unwrap_or_default();
    info!("Ultralytics {VERSION} 🚀 SimplePose ONNX {precision} {device}");

    let imgsz = model.imgsz();
    let heatmap_size = model.heatmap_size();
    verbose!(
        "{} summary: {} keypoints, imgsz=({}, {}), heatmap=({}, {})",
        model.metadata().backbone.model_name(),
        model.num_keypoints(),
        imgsz.0,
        imgsz.1,
        heatmap_size.0,
        heatmap_size.1
    );
    verbose!("");

    let source = Source::from(args.source.as_str());

    #[cfg(feature = "annotate")]
    let save_dir = if args.save {
        let dir = PathBuf::from(find_next_run_dir("runs/pose", "predict"));
        if let Err(e) = fs::create_dir_all(&dir) {
            error!("Failed to create save directory {}: {e}", dir.display());
            process::exit(1);
        }
        Some(dir)
    } else {
        None
    };

    #[cfg(not(feature = "annotate"))]
    if args.save {
        warn!("--save requires the 'annotate' feature. Compile with --features annotate to enable saving.");
    }

    let threshold = args.conf;
    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut unreadable = 0usize;
    let mut total_preprocess = 0.0;
    let mut total_inference = 0.0;
    let mut total_postprocess = 0.0;

    // Decode images on a producer thread while the main thread runs inference.
    let (sender, receiver) = std::sync::mpsc::sync_channel(batch_size * 2);
    std::thread::spawn(move || {
        let iter = match SourceIterator::new(source) {
            Ok(iter) => iter,
            Err(e) => {
                error!("Error initializing source: {e}");
                return;
            }
        };
        if iter.is_empty() {
            warn!("No images found in source");
        }
        for item in iter {
            if sender.send(item).is_err() {
                break;
            }
        }
    });

    {
        let mut batch_processor = BatchProcessor::new(
            &mut model,
            batch_size,
            |batch_results: Vec<Option<Results>>,
             images: &[image::DynamicImage],
             _paths: &[String],
             metas: &[SourceMeta],
             _offset: usize| {
                for (result, (meta, img)) in batch_results.into_iter().zip(metas.iter().zip(images)) {
                    let Some(result) = result else {
                        failed += 1;
                        continue;
                    };

                    verbose!(
                        "image {}/{} {}: {}x{} {}, {:.1}ms",
                        meta.index + 1,
                        meta.total,
                        meta.path,
                        result.inference_shape.0,
                        result.inference_shape.1,
                        format_keypoint_summary(&result, threshold),
                        result.speed.inference.unwrap_or(0.0)
                    );
                    if let Some(ref keypoints) = result.keypoints {
                        for k in keypoints.visible(threshold) {
                            verbose!(
                                "  {:<16} x={:.1} y={:.1} score={:.3}",
                                result.keypoint_name(k),
                                keypoints.data[[k, 0]],
                                keypoints.data[[k, 1]],
                                keypoints.data[[k, 2]]
                            );
                        }
                    }

                    #[cfg(feature = "annotate")]
                    if let Some(ref dir) = save_dir {
                        let annotated = annotate_image(img, &result, threshold);
                        let out = dir.join(output_file_name(&meta.path, meta.index));
                        if let Err(e) = annotated.save(&out) {
                            error!("Failed to save {}: {e}", out.display());
                        }
                    }
                    #[cfg(not(feature = "annotate"))]
                    let _ = img;

                    total_preprocess += result.speed.preprocess.unwrap_or(0.0);
                    total_inference += result.speed.inference.unwrap_or(0.0);
                    total_postprocess += result.speed.postprocess.unwrap_or(0.0);
                    processed += 1;
                }
            },
        );

        for item in receiver {
            match item {
                Ok((img, meta)) => batch_processor.add(img, meta.path.clone(), meta),
                Err(e) => {
                    error!("Error reading source: {e}");
                    unreadable += 1;
                }
            }
        }
        batch_processor.flush();
    }

    section!("Summary");
    let n = processed.max(1) as f64;
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image at shape ({}, 3, {}, {})",
        total_preprocess / n,
        total_inference / n,
        total_postprocess / n,
        batch_size,
        imgsz.0,
        imgsz.1
    );
    let failed = failed + unreadable;
    if failed > 0 {
        warn!("{failed} {} failed", pluralize(failed, "image"));
    }

    #[cfg(feature = "annotate")]
    if let Some(ref dir) = save_dir {
        success!("Results saved to {}", dir.display());
    }
}

/// Summarize one result, e.g. `"12/17 keypoints"` or `"17 heatmaps 64x48"`.
fn format_keypoint_summary(result: &Results, threshold: f32) -> String {
    if let Some(ref keypoints) = result.keypoints {
        let visible = keypoints.visible(threshold).len();
        return format!("{visible}/{} {}", keypoints.len(), pluralize(keypoints.len(), "keypoint"));
    }
    result.verbose()
}

fn pluralize(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// File name for a saved annotation; in-memory sources get `image{index}.jpg`.
#[cfg(feature = "annotate")]
fn output_file_name(path: &str, index: usize) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| format!("image{index}.jpg"), |name| name.to_string_lossy().to_string())
}
