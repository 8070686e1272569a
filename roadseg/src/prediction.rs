//! Full-image prediction: classify the patch around every pixel and stitch the
//! results back into a [`LabelGrid`].

use std::marker::PhantomData;

use burn::{prelude::*, tensor::activation::softmax};

use crate::{
    batch::assemble_patches,
    config::PredictionConfig,
    error::{RoadSegError, RoadSegResult},
    geometry::{pad, scan_order, PixelCoord, SampleCoord},
    grid::LabelGrid,
    labels::NUM_LABELS,
    model::PatchClassifier,
};

/// Background probability above which a grid cell is set.
pub const BACKGROUND_THRESHOLD: f32 = 0.5;

/// Runs a [`PatchClassifier`] over every pixel position of an image.
pub struct Predictor<'a, B: Backend, M> {
    model: &'a M,
    patch_size: usize,
    batch_size: usize,
    fill_holes: bool,
    _backend: PhantomData<B>,
}

impl<'a, B: Backend, M: PatchClassifier<B>> Predictor<'a, B, M> {
    pub fn new(model: &'a M, patch_size: usize, config: &PredictionConfig) -> Self {
        Self {
            model,
            patch_size,
            batch_size: config.batch_size.max(1),
            fill_holes: config.fill_holes,
            _backend: PhantomData,
        }
    }

    /// Background probability of every pixel of a `[height, width, channels]`
    /// image, listed in [`scan_order`].
    ///
    /// Pixels are classified `batch_size` at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the image has no pixels or the classifier output
    /// cannot be read back.
    pub fn background_probabilities(&self, image: Tensor<B, 3>) -> RoadSegResult<Vec<f32>> {
        let padded = pad(image, self.patch_size / 2)?;
        let images = [padded];
        let pixels: Vec<PixelCoord> = scan_order(images[0].height(), images[0].width()).collect();

        let mut probabilities = Vec::with_capacity(pixels.len());
        for (chunk_index, chunk) in pixels.chunks(self.batch_size).enumerate() {
            tracing::debug!(chunk = chunk_index, patches = chunk.len(), "classifying patches");

            let coords: Vec<SampleCoord> = chunk
                .iter()
                .map(|&pixel| SampleCoord { image: 0, pixel })
                .collect();
            let patches = assemble_patches(&coords, &images, self.patch_size);
            let logits = self.model.logits(patches);
            if logits.dims() != [chunk.len(), NUM_LABELS] {
                return Err(RoadSegError::ShapeMismatch {
                    expected: format!("[{}, {NUM_LABELS}]", chunk.len()),
                    actual: format!("{:?}", logits.dims()),
                });
            }

            let values = softmax(logits, 1)
                .slice([0..chunk.len(), 0..1])
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| RoadSegError::TensorData {
                    reason: format!("{e:?}"),
                })?;
            probabilities.extend(values);
        }
        Ok(probabilities)
    }

    /// Predicts the label grid of a `[height, width, channels]` image.
    ///
    /// A cell is 1 where the background probability exceeds
    /// [`BACKGROUND_THRESHOLD`]; a tie goes to road. Enclosed holes are filled
    /// when the configuration asks for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the image has no pixels or the classifier output
    /// cannot be read back.
    pub fn predict(&self, image: Tensor<B, 3>) -> RoadSegResult<LabelGrid> {
        let [height, width, _] = image.dims();
        let probabilities = self.background_probabilities(image)?;

        let mut grid = LabelGrid::from_scan(
            height,
            width,
            probabilities.iter().map(|&p| p > BACKGROUND_THRESHOLD),
        )?;
        if self.fill_holes {
            grid.fill_holes();
        }

        tracing::info!(
            height,
            width,
            background = grid.count_ones(),
            "predicted label grid"
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoadNetConfig;
    use burn::backend::ndarray::NdArray;
    use std::cell::RefCell;

    type TestBackend = NdArray<f32>;

    /// Classifies a patch as background when its centre pixel is below 0.5
    /// and records the size of every batch it sees.
    struct CentreClassifier {
        batches: RefCell<Vec<usize>>,
    }

    impl CentreClassifier {
        fn new() -> Self {
            Self {
                batches: RefCell::new(Vec::new()),
            }
        }
    }

    impl PatchClassifier<TestBackend> for CentreClassifier {
        fn logits(&self, patches: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 2> {
            let [n, size, _, _] = patches.dims();
            self.batches.borrow_mut().push(n);
            let half = size / 2;
            let centre: Tensor<TestBackend, 2> = patches
                .slice([0..n, half..half + 1, half..half + 1, 0..1])
                .reshape([n, 1]);
            let background = centre.clone().lower_elem(0.5).float().mul_scalar(10.0);
            let road = centre.greater_equal_elem(0.5).float().mul_scalar(10.0);
            Tensor::cat(vec![background, road], 1)
        }
    }

    fn image(rows: &[&str]) -> Tensor<TestBackend, 3> {
        let height = rows.len();
        let width = rows[0].len();
        let mut values = Vec::with_capacity(height * width * 3);
        for line in rows {
            for c in line.chars() {
                let v = if c == '#' { 1.0 } else { 0.0 };
                values.extend([v, v, v]);
            }
        }
        Tensor::from_data(
            TensorData::new(values, [height, width, 3]),
            &Default::default(),
        )
    }

    fn config(batch_size: usize, fill_holes: bool) -> PredictionConfig {
        PredictionConfig::new()
            .with_batch_size(batch_size)
            .with_fill_holes(fill_holes)
    }

    #[test]
    fn stitched_grid_lines_up_with_the_image() {
        let classifier = CentreClassifier::new();
        let predictor = Predictor::new(&classifier, 4, &config(4, false));

        let grid = predictor
            .predict(image(&["#....", "..#..", "....#"]))
            .unwrap();

        // Road pixels (bright) are background-probability zero.
        assert_eq!(grid.dims(), (3, 5));
        assert_eq!(grid.get(PixelCoord::new(0, 0)), 0);
        assert_eq!(grid.get(PixelCoord::new(1, 2)), 0);
        assert_eq!(grid.get(PixelCoord::new(2, 4)), 0);
        assert_eq!(grid.get(PixelCoord::new(0, 1)), 1);
        assert_eq!(grid.count_ones(), 12);
    }

    #[test]
    fn pixels_are_classified_in_bounded_chunks() {
        let classifier = CentreClassifier::new();
        let predictor = Predictor::new(&classifier, 4, &config(4, false));

        predictor.predict(image(&["....."; 3])).unwrap();

        assert_eq!(*classifier.batches.borrow(), vec![4, 4, 4, 3]);
    }

    #[test]
    fn grid_matches_sizes_not_divisible_by_the_patch() {
        let device = Default::default();
        let model = RoadNetConfig::new(8).init::<TestBackend>(&device);
        let predictor = Predictor::new(&model, 8, &config(64, true));

        for (height, width) in [(7, 7), (9, 13), (1, 1)] {
            let image = Tensor::<TestBackend, 3>::full([height, width, 3], 0.3, &device);
            let grid = predictor.predict(image).unwrap();
            assert_eq!(grid.dims(), (height, width));
        }
    }

    #[test]
    fn enclosed_road_pixels_are_filled_when_enabled() {
        let rows = ["#####", "#...#", "#...#", "#####"];
        let classifier = CentreClassifier::new();

        let raw = Predictor::new(&classifier, 4, &config(100, false))
            .predict(image(&rows))
            .unwrap();
        let filled = Predictor::new(&classifier, 4, &config(100, true))
            .predict(image(&rows))
            .unwrap();

        // Dark interior is background (1), bright ring is road (0): the ring
        // touches the border, so filling leaves it alone.
        assert_eq!(raw, filled);

        let ring = ["....", ".##.", ".##.", "...."];
        let raw = Predictor::new(&classifier, 4, &config(100, false))
            .predict(image(&ring))
            .unwrap();
        let filled = Predictor::new(&classifier, 4, &config(100, true))
            .predict(image(&ring))
            .unwrap();
        assert_eq!(raw.count_ones(), 12);
        assert_eq!(filled.count_ones(), 16);
    }

    #[test]
    fn background_probabilities_follow_scan_order() {
        let classifier = CentreClassifier::new();
        let predictor = Predictor::new(&classifier, 4, &config(10, false));

        let probabilities = predictor
            .background_probabilities(image(&["#.", ".."]))
            .unwrap();

        // Scan order is (0,0), (1,0), (0,1), (1,1).
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[1..].iter().all(|&p| p > 0.5));
    }
}
