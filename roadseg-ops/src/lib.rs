//! Additional operations for the Burn deep learning framework
//!
//! This crate provides the handful of tensor operations the road segmentation
//! network needs but that are not available in the core Burn framework.

use burn::prelude::*;

mod trunc_normal;

pub use trunc_normal::{trunc_normal, TRUNCATION_STDS};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Half the sum of squares of every element, `sum(x ** 2) / 2`.
    fn l2_loss(self) -> Tensor<B, 1>;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn l2_loss(self) -> Tensor<B, 1> {
        self.powf_scalar(2.0).sum().div_scalar(2.0)
    }
}
