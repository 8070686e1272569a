//! Label indexing: splitting ground-truth masks into per-class coordinate lists.

use burn::prelude::*;

use crate::{
    error::{RoadSegError, RoadSegResult},
    geometry::{scan_order, SampleCoord},
};

/// Mask values strictly above this threshold are road.
pub const ROAD_THRESHOLD: f32 = 0.5;

/// Number of classes predicted by the network.
pub const NUM_LABELS: usize = 2;

/// Binary pixel class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelClass {
    Background = 0,
    Road = 1,
}

impl PixelClass {
    /// Class of a ground-truth mask value.
    pub fn from_mask_value(value: f32) -> Self {
        if value > ROAD_THRESHOLD {
            Self::Road
        } else {
            Self::Background
        }
    }

    /// Class of a one-hot position.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Background),
            1 => Some(Self::Road),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// `Background -> [1, 0]`, `Road -> [0, 1]`.
    pub const fn one_hot(self) -> [f32; NUM_LABELS] {
        match self {
            Self::Background => [1.0, 0.0],
            Self::Road => [0.0, 1.0],
        }
    }
}

/// Training coordinates grouped by ground-truth class.
///
/// Each list holds coordinates in image order and, within an image, in
/// [`scan_order`]. No coordinate is deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelClassLists {
    pub background: Vec<SampleCoord>,
    pub road: Vec<SampleCoord>,
}

impl LabelClassLists {
    /// Appends every pixel of `mask` to the list of its class.
    ///
    /// # Errors
    ///
    /// Returns [`RoadSegError::TensorData`] if the mask cannot be read back.
    pub fn index_mask<B: Backend>(
        &mut self,
        image: usize,
        mask: Tensor<B, 2>,
    ) -> RoadSegResult<()> {
        let [height, width] = mask.dims();
        let values = mask
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| RoadSegError::TensorData {
                reason: format!("{e:?}"),
            })?;

        for pixel in scan_order(height, width) {
            let coord = SampleCoord { image, pixel };
            match PixelClass::from_mask_value(values[pixel.row * width + pixel.col]) {
                PixelClass::Background => self.background.push(coord),
                PixelClass::Road => self.road.push(coord),
            }
        }
        Ok(())
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.background.len(), self.road.len())
    }
}

/// Builds the per-class coordinate lists of a set of `[height, width]` masks.
///
/// Mask `k` contributes coordinates with image index `k`.
///
/// # Errors
///
/// Returns [`RoadSegError::TensorData`] if a mask cannot be read back.
pub fn index_labels<B: Backend>(masks: &[Tensor<B, 2>]) -> RoadSegResult<LabelClassLists> {
    let mut lists = LabelClassLists::default();
    for (image, mask) in masks.iter().enumerate() {
        lists.index_mask(image, mask.clone())?;
    }

    let (background, road) = lists.counts();
    tracing::info!(background, road, "indexed ground-truth labels");
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn mask(rows: [[f32; 3]; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_floats(rows, &Default::default())
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(PixelClass::from_mask_value(0.5), PixelClass::Background);
        assert_eq!(PixelClass::from_mask_value(0.51), PixelClass::Road);
        assert_eq!(PixelClass::from_mask_value(1.0), PixelClass::Road);
    }

    #[test]
    fn one_hot_round_trips_through_argmax() {
        for class in [PixelClass::Background, PixelClass::Road] {
            let encoded = class.one_hot();
            let argmax = if encoded[0] >= encoded[1] { 0 } else { 1 };
            assert_eq!(PixelClass::from_index(argmax), Some(class));
        }
        assert_eq!(PixelClass::Background.one_hot(), [1.0, 0.0]);
        assert_eq!(PixelClass::Road.one_hot(), [0.0, 1.0]);
        assert_eq!(PixelClass::from_index(2), None);
    }

    #[test]
    fn pixels_are_listed_in_scan_order() {
        let masks = vec![mask([[0.0, 1.0, 0.0], [1.0, 0.0, 0.9]])];

        let lists = index_labels(&masks).unwrap();

        assert_eq!(
            lists.road,
            vec![
                SampleCoord::new(0, 1, 0),
                SampleCoord::new(0, 0, 1),
                SampleCoord::new(0, 1, 2),
            ]
        );
        assert_eq!(
            lists.background,
            vec![
                SampleCoord::new(0, 0, 0),
                SampleCoord::new(0, 1, 1),
                SampleCoord::new(0, 0, 2),
            ]
        );
    }

    #[test]
    fn image_index_follows_mask_position() {
        let masks = vec![
            mask([[0.0; 3]; 2]),
            mask([[0.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
        ];

        let lists = index_labels(&masks).unwrap();

        assert_eq!(lists.counts(), (11, 1));
        assert_eq!(lists.road, vec![SampleCoord::new(1, 1, 2)]);
        assert!(lists.background[..6].iter().all(|c| c.image == 0));
        assert!(lists.background[6..].iter().all(|c| c.image == 1));
    }
}
