// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Batch processing module.
//!
//! This module provides the [`BatchProcessor`] struct, which abstracts the logic for
//! buffering images and running batch inference.

use image::DynamicImage;

use crate::model::PoseModel;
use crate::network::HeatmapNetwork;
use crate::results::Results;
use crate::source::SourceMeta;

/// A processor for handling batch inference.
///
/// Images are buffered until `batch_size` is reached, then run through
/// [`PoseModel::predict_batch`]. If the batched call fails (for example a model exported
/// with a fixed batch of 1), each image is retried on its own. The callback receives one
/// entry per image, `None` where inference failed, plus the index of the first image.
///
/// # Example
///
/// ```no_run
/// use simplepose_inference::{PoseModel, batch::BatchProcessor};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut model = PoseModel::load("simplepose_resnet18_coco.onnx")?;
///
///     let mut processor = BatchProcessor::new(&mut model, 4, |results, _images, _paths, _metas, offset| {
///         println!("Processed {} images starting at {offset}", results.len());
///     });
///
///     // processor.add(image, path, meta);
///
///     processor.flush();
///     Ok(())
/// }
/// ```
pub struct BatchProcessor<'a, N, F>
where
    N: HeatmapNetwork,
    F: FnMut(Vec<Option<Results>>, &[DynamicImage], &[String], &[SourceMeta], usize),
{
    model: &'a mut PoseModel<N>,
    batch_size: usize,
    images: Vec<DynamicImage>,
    paths: Vec<String>,
    metas: Vec<SourceMeta>,
    callback: F,
    processed: usize,
}

impl<'a, N, F> BatchProcessor<'a, N, F>
where
    N: HeatmapNetwork,
    F: FnMut(Vec<Option<Results>>, &[DynamicImage], &[String], &[SourceMeta], usize),
{
    /// Create a new `BatchProcessor`. A `batch_size` of 0 is treated as 1.
    pub fn new(model: &'a mut PoseModel<N>, batch_size: usize, callback: F) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            model,
            batch_size,
            images: Vec::with_capacity(batch_size),
            paths: Vec::with_capacity(batch_size),
            metas: Vec::with_capacity(batch_size),
            callback,
            processed: 0,
        }
    }

    /// Add an image to the batch.
    ///
    /// If the batch becomes full, it is automatically processed.
    pub fn add(&mut self, image: DynamicImage, path: String, meta: SourceMeta) {
        self.images.push(image);
        self.paths.push(path);
        self.metas.push(meta);

        if self.images.len() >= self.batch_size {
            self.process();
        }
    }

    /// Process any remaining images in the batch.
    pub fn flush(&mut self) {
        self.process();
    }

    /// Number of images handed to the callback so far.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.processed
    }

    fn process(&mut self) {
        if self.images.is_empty() {
            return;
        }

        let batch_results = self.run_inference();
        (self.callback)(
            batch_results,
            &self.images,
            &self.paths,
            &self.metas,
            self.processed,
        );

        self.processed += self.images.len();
        self.images.clear();
        self.paths.clear();
        self.metas.clear();
    }

    fn run_inference(&mut self) -> Vec<Option<Results>> {
        match self.model.predict_batch(&self.images, &self.paths) {
            Ok(results) => return results.into_iter().map(Some).collect(),
            Err(e) if self.images.len() > 1 => {
                eprintln!("WARNING ⚠️ Batch inference failed ({e}). Falling back to single-image inference...");
            }
            Err(_) => {}
        }

        self.images
            .iter()
            .zip(&self.paths)
            .map(|(img, path)| match self.model.predict_image(img, path.clone()) {
                Ok(results) => results.into_iter().next(),
                Err(e) => {
                    eprintln!("Error processing {path}: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InferenceError, Result};
    use crate::heatmap::HeatmapTensor;
    use crate::inference::InferenceConfig;
    use ndarray::Array4;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Network that only accepts a batch of one, like a fixed-shape export.
    struct SingleBatchNetwork;

    impl HeatmapNetwork for SingleBatchNetwork {
        fn forward(&mut self, input: &Array4<f32>) -> Result<HeatmapTensor> {
            let (b, _, h, w) = input.dim();
            if b != 1 {
                return Err(InferenceError::InferenceError(format!("batch {b} not supported")));
            }
            HeatmapTensor::new(Array4::from_elem((1, 17, h / 4, w / 4), 0.5))
        }
    }

    fn model() -> PoseModel<SingleBatchNetwork> {
        PoseModel::from_network(SingleBatchNetwork, InferenceConfig::new().with_imgsz(64, 48)).unwrap()
    }

    fn meta() -> SourceMeta {
        SourceMeta {
            index: 0,
            total: 1,
            path: "test.jpg".to_string(),
        }
    }

    #[test]
    fn test_batch_processor_buffers_and_falls_back() {
        let mut model = model();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = Rc::clone(&calls);

        let mut processor = BatchProcessor::new(&mut model, 2, move |results, images, _paths, _metas, offset| {
            assert_eq!(results.len(), images.len());
            assert!(results.iter().all(Option::is_some));
            calls_clone.borrow_mut().push((results.len(), offset));
        });

        processor.add(DynamicImage::new_rgb8(32, 32), "img1.jpg".to_string(), meta());
        assert!(calls.borrow().is_empty());

        processor.add(DynamicImage::new_rgb8(32, 32), "img2.jpg".to_string(), meta());
        assert_eq!(calls.borrow().len(), 1);

        processor.add(DynamicImage::new_rgb8(32, 32), "img3.jpg".to_string(), meta());
        processor.flush();
        assert_eq!(processor.processed(), 3);

        assert_eq!(*calls.borrow(), vec![(2, 0), (1, 2)]);
    }

    #[test]
    fn test_batch_processor_empty_flush() {
        let mut model = model();
        let count = Rc::new(RefCell::new(0));
        let count_clone = Rc::clone(&count);

        let mut processor = BatchProcessor::new(&mut model, 2, move |_results, _images, _paths, _metas, _offset| {
            *count_clone.borrow_mut() += 1;
        });

        processor.flush();
        assert_eq!(*count.borrow(), 0);
    }
}
