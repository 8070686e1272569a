//! Loading satellite images and ground-truth masks from disk.

use std::path::Path;

use burn::prelude::*;
use image::Rgb32FImage;

use crate::{
    config::DatasetConfig,
    error::{RoadSegError, RoadSegResult},
};

/// Decodes an image file into floating point RGB with values in `[0, 1]`.
///
/// # Errors
///
/// Returns [`RoadSegError::ImageLoad`] if the file cannot be opened or decoded.
pub fn load_rgb_image(path: impl AsRef<Path>) -> RoadSegResult<Rgb32FImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| RoadSegError::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.into_rgb32f())
}

/// Converts an RGB image to a `[height, width, 3]` tensor.
pub fn rgb_to_tensor<B: Backend>(image: &Rgb32FImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();
    let data = TensorData::new(image.as_raw().clone(), [height as usize, width as usize, 3])
        .convert::<B::FloatElem>();
    Tensor::from_data(data, device)
}

/// Loads a ground-truth mask as a `[height, width]` tensor in `[0, 1]`.
///
/// Colour masks are reduced to luminance.
///
/// # Errors
///
/// Returns [`RoadSegError::ImageLoad`] if the file cannot be opened or decoded.
pub fn load_mask<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> RoadSegResult<Tensor<B, 2>> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| RoadSegError::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mask = image.to_luma32f();
    let (width, height) = mask.dimensions();
    let data = TensorData::new(mask.into_raw(), [height as usize, width as usize])
        .convert::<B::FloatElem>();
    Ok(Tensor::from_data(data, device))
}

/// Training images paired with their masks.
///
/// `images[k]` and `masks[k]` come from the same file index `ids[k]`; position
/// `k` is the image index used by every sample coordinate.
#[derive(Debug, Clone)]
pub struct TrainingImages<B: Backend> {
    pub ids: Vec<usize>,
    pub images: Vec<Tensor<B, 3>>,
    pub masks: Vec<Tensor<B, 2>>,
}

impl<B: Backend> TrainingImages<B> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Loads training images `1..=training_size` and their masks.
///
/// A pair is skipped with a warning when either file is missing, so image and
/// mask positions stay aligned.
///
/// # Errors
///
/// Returns [`RoadSegError::NoTrainingData`] when no pair could be found, or a
/// load error for a file that exists but cannot be decoded.
pub fn load_training_images<B: Backend>(
    config: &DatasetConfig,
    device: &B::Device,
) -> RoadSegResult<TrainingImages<B>> {
    let mut loaded = TrainingImages {
        ids: Vec::new(),
        images: Vec::new(),
        masks: Vec::new(),
    };

    for id in 1..=config.training_size {
        let image_path = config.image_path(id);
        let mask_path = config.groundtruth_path(id);
        if !image_path.is_file() || !mask_path.is_file() {
            tracing::warn!(
                image = %image_path.display(),
                mask = %mask_path.display(),
                "training pair missing, skipping"
            );
            continue;
        }

        let image = load_rgb_image(&image_path)?;
        let mask = load_mask::<B>(&mask_path, device)?;
        let (width, height) = image.dimensions();
        let [mask_height, mask_width] = mask.dims();
        if (mask_height, mask_width) != (height as usize, width as usize) {
            return Err(RoadSegError::ShapeMismatch {
                expected: format!("{height}x{width} mask for {}", image_path.display()),
                actual: format!("{mask_height}x{mask_width}"),
            });
        }

        tracing::debug!(id, height, width, "loaded training pair");
        loaded.ids.push(id);
        loaded.images.push(rgb_to_tensor(&image, device));
        loaded.masks.push(mask);
    }

    if loaded.is_empty() {
        return Err(RoadSegError::NoTrainingData {
            dir: config.data_dir.clone(),
        });
    }
    tracing::info!(count = loaded.len(), "loaded training images");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::satellite_image_name;
    use burn::backend::ndarray::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn write_pair(config: &DatasetConfig, id: usize, size: u32) {
        let image = RgbImage::from_fn(size, size, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 0]));
        let mask = GrayImage::from_fn(size, size, |x, _| {
            Luma([if x % 2 == 0 { 255 } else { 0 }])
        });
        let image_path = config.image_path(id);
        let mask_path = config.groundtruth_path(id);
        std::fs::create_dir_all(image_path.parent().unwrap()).unwrap();
        std::fs::create_dir_all(mask_path.parent().unwrap()).unwrap();
        image.save(image_path).unwrap();
        mask.save(mask_path).unwrap();
    }

    #[test]
    fn rgb_tensor_keeps_row_and_column_layout() {
        let image = Rgb32FImage::from_fn(3, 2, |x, y| Rgb([x as f32, y as f32, 0.5]));

        let tensor = rgb_to_tensor::<TestBackend>(&image, &Default::default());

        assert_eq!(tensor.dims(), [2, 3, 3]);
        let values = tensor
            .slice([1..2, 2..3, 0..3])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values, vec![2.0, 1.0, 0.5]);
    }

    #[test]
    fn missing_pairs_are_skipped_and_the_rest_stay_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::new()
            .with_data_dir(dir.path().to_path_buf())
            .with_training_size(3);
        write_pair(&config, 1, 4);
        write_pair(&config, 3, 6);
        std::fs::remove_file(config.data_dir.join("groundtruth").join(satellite_image_name(3)))
            .unwrap();
        write_pair(&config, 2, 5);

        let loaded = load_training_images::<TestBackend>(&config, &Default::default()).unwrap();

        assert_eq!(loaded.ids, vec![1, 2]);
        assert_eq!(loaded.images[1].dims(), [5, 5, 3]);
        assert_eq!(loaded.masks[1].dims(), [5, 5]);
        let first_row = loaded.masks[0]
            .clone()
            .slice([0..1, 0..4])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(first_row, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn an_empty_directory_has_no_training_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::new().with_data_dir(dir.path().to_path_buf());

        assert!(matches!(
            load_training_images::<TestBackend>(&config, &Default::default()),
            Err(RoadSegError::NoTrainingData { .. })
        ));
    }

    #[test]
    fn unreadable_image_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        match load_rgb_image(&path) {
            Err(RoadSegError::ImageLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected ImageLoad error, got {other:?}"),
        }
    }
}
