//! Batch assembly: stacked patches and one-hot labels for training steps.

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::{
    error::RoadSegResult,
    geometry::{pad, PaddedImage, SampleCoord},
    labels::{PixelClass, NUM_LABELS},
    patch::extract_patch,
    sampler::TrainingSample,
};

/// A batch of patches and their one-hot labels.
#[derive(Debug, Clone)]
pub struct PatchBatch<B: Backend> {
    /// Patches with shape `[N, S, S, C]`.
    pub patches: Tensor<B, 4>,
    /// One-hot labels with shape `[N, 2]`.
    pub labels: Tensor<B, 2>,
}

/// Stacks the patches centred on `coords` into a `[N, S, S, C]` tensor.
///
/// # Panics
///
/// Panics when a coordinate names an image that does not exist or a patch
/// falls outside its padded image.
pub fn assemble_patches<B: Backend>(
    coords: &[SampleCoord],
    images: &[PaddedImage<B>],
    patch_size: usize,
) -> Tensor<B, 4> {
    let patches: Vec<Tensor<B, 3>> = coords
        .iter()
        .map(|coord| {
            assert!(
                coord.image < images.len(),
                "coordinate refers to image {} but only {} are loaded",
                coord.image,
                images.len()
            );
            extract_patch(&images[coord.image], coord.pixel, patch_size)
        })
        .collect();
    Tensor::stack(patches, 0)
}

/// Encodes classes as one-hot rows: background `[1, 0]`, road `[0, 1]`.
pub fn one_hot_labels<B: Backend>(classes: &[PixelClass], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = classes.iter().flat_map(|class| class.one_hot()).collect();
    Tensor::from_data(
        TensorData::new(values, [classes.len(), NUM_LABELS]),
        device,
    )
}

/// Turns training samples into [`PatchBatch`]es.
///
/// Owns the padded training images so that a batch can be gathered from
/// coordinates alone.
#[derive(Clone, Debug)]
pub struct PatchBatcher<B: Backend> {
    images: Arc<[PaddedImage<B>]>,
    patch_size: usize,
}

impl<B: Backend> PatchBatcher<B> {
    /// Pads every image by half the patch size.
    ///
    /// # Errors
    ///
    /// Returns an error if an image has no pixels.
    pub fn new(images: Vec<Tensor<B, 3>>, patch_size: usize) -> RoadSegResult<Self> {
        let images = images
            .into_iter()
            .map(|image| pad(image, patch_size / 2))
            .collect::<RoadSegResult<Vec<_>>>()?;
        Ok(Self {
            images: images.into(),
            patch_size,
        })
    }

    pub fn images(&self) -> &[PaddedImage<B>] {
        &self.images
    }

    pub const fn patch_size(&self) -> usize {
        self.patch_size
    }
}

impl<B: Backend> Batcher<B, TrainingSample, PatchBatch<B>> for PatchBatcher<B> {
    fn batch(&self, items: Vec<TrainingSample>, device: &B::Device) -> PatchBatch<B> {
        let coords: Vec<_> = items.iter().map(|item| item.coord).collect();
        let classes: Vec<_> = items.iter().map(|item| item.class).collect();

        PatchBatch {
            patches: assemble_patches(&coords, &self.images, self.patch_size),
            labels: one_hot_labels(&classes, device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn constant_image(value: f32) -> Tensor<TestBackend, 3> {
        Tensor::full([6, 6, 3], value, &Default::default())
    }

    #[test]
    fn one_hot_labels_encode_each_class() {
        let labels = one_hot_labels::<TestBackend>(
            &[PixelClass::Road, PixelClass::Background, PixelClass::Road],
            &Default::default(),
        );

        assert_eq!(labels.dims(), [3, 2]);
        let values = labels.to_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn batcher_stacks_patches_from_the_named_images() {
        let device = Default::default();
        let batcher =
            PatchBatcher::new(vec![constant_image(0.1), constant_image(0.9)], 4).unwrap();

        let batch = batcher.batch(
            vec![
                TrainingSample {
                    coord: SampleCoord::new(1, 3, 3),
                    class: PixelClass::Road,
                },
                TrainingSample {
                    coord: SampleCoord::new(0, 2, 2),
                    class: PixelClass::Background,
                },
            ],
            &device,
        );

        assert_eq!(batch.patches.dims(), [2, 4, 4, 3]);
        assert_eq!(batch.labels.dims(), [2, 2]);

        let first: f32 = batch
            .patches
            .clone()
            .slice([0..1, 2..3, 2..3, 0..1])
            .into_scalar();
        let second: f32 = batch.patches.slice([1..2, 2..3, 2..3, 0..1]).into_scalar();
        assert!((first - 0.9).abs() < 1e-6);
        assert!((second - 0.1).abs() < 1e-6);
    }

    #[test]
    fn batcher_pads_images_by_half_the_patch() {
        let batcher = PatchBatcher::new(vec![constant_image(0.0)], 8).unwrap();

        assert_eq!(batcher.images()[0].margin(), 4);
        assert_eq!(batcher.images()[0].tensor().dims(), [14, 14, 3]);
    }

    #[test]
    #[should_panic(expected = "only 1 are loaded")]
    fn unknown_image_index_panics() {
        let images = vec![pad(constant_image(0.0), 2).unwrap()];
        assemble_patches(&[SampleCoord::new(3, 0, 0)], &images, 4);
    }
}
