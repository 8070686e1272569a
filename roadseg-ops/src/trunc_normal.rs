//! # Truncated Normal Distribution
//!
//! Initialises tensors from a normal distribution whose samples lying more than
//! two standard deviations away from the mean are drawn again. This is the
//! initialisation used for every weight matrix of the patch classifier.

use burn::{
    prelude::*,
    tensor::{Distribution, ElementConversion},
};

/// Samples further than this many standard deviations from the mean are redrawn.
pub const TRUNCATION_STDS: f64 = 2.0;

/// Redraw rounds before the remaining outliers are clamped onto the bounds.
const MAX_REDRAW_ROUNDS: usize = 16;

/// Creates a tensor filled with values from a truncated normal distribution.
///
/// Out-of-range samples are replaced with fresh draws until none remain, so the
/// result follows the normal distribution conditioned on `|x - mean| <= 2 * std`.
/// After a bounded number of rounds any stragglers are clamped.
///
/// # Arguments
///
/// * `shape` - Shape of the tensor to create.
/// * `mean` - The mean of the normal distribution.
/// * `std` - The standard deviation of the normal distribution.
/// * `device` - Device to create the tensor on.
pub fn trunc_normal<B: Backend, const D: usize, S: Into<Shape>>(
    shape: S,
    mean: f64,
    std: f64,
    device: &B::Device,
) -> Tensor<B, D> {
    let shape = shape.into();
    let distribution = Distribution::Normal(mean, std);
    let limit = TRUNCATION_STDS * std;

    let mut values = Tensor::<B, D>::random(shape.clone(), distribution, device);
    for _ in 0..MAX_REDRAW_ROUNDS {
        let outside = values
            .clone()
            .sub_scalar(mean)
            .abs()
            .greater_elem(limit);
        let remaining = outside.clone().int().sum().into_scalar().elem::<i64>();
        if remaining == 0 {
            return values;
        }
        let redraw = Tensor::<B, D>::random(shape.clone(), distribution, device);
        values = values.mask_where(outside, redraw);
    }

    values.clamp(mean - limit, mean + limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn trunc_normal_respects_bounds() {
        let device = Default::default();
        let tensor = trunc_normal::<TestBackend, 2, _>([64, 64], 0.0, 0.1, &device);

        assert_eq!(tensor.dims(), [64, 64]);
        let values = tensor.to_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| v.abs() <= 0.2 + 1e-6));
    }

    #[test]
    fn trunc_normal_is_centred_on_the_mean() {
        let device = Default::default();
        let tensor = trunc_normal::<TestBackend, 1, _>([20_000], 3.0, 0.5, &device);

        let values = tensor.to_data().to_vec::<f32>().unwrap();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert!((mean - 3.0).abs() < 0.05, "sample mean {mean} too far from 3.0");
        assert!(values.iter().all(|v| (v - 3.0).abs() <= 1.0 + 1e-6));
    }
}
