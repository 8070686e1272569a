//! Minibatch error rate.

use burn::prelude::*;

use crate::error::{RoadSegError, RoadSegResult};

/// Percentage of rows whose argmax differs between `predictions` and `labels`.
///
/// Both tensors are `[N, classes]`. An empty batch has an error rate of 0.
///
/// # Errors
///
/// Returns [`RoadSegError::ShapeMismatch`] if the shapes differ and
/// [`RoadSegError::TensorData`] if the argmax cannot be read back.
pub fn error_rate<B: Backend>(
    predictions: Tensor<B, 2>,
    labels: Tensor<B, 2>,
) -> RoadSegResult<f64> {
    if predictions.dims() != labels.dims() {
        return Err(RoadSegError::ShapeMismatch {
            expected: format!("{:?}", labels.dims()),
            actual: format!("{:?}", predictions.dims()),
        });
    }
    let [rows, _] = labels.dims();
    if rows == 0 {
        return Ok(0.0);
    }

    let correct = predictions
        .argmax(1)
        .equal(labels.argmax(1))
        .int()
        .sum()
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| RoadSegError::TensorData {
            reason: format!("{e:?}"),
        })?;
    let correct = correct.first().copied().unwrap_or_default() as f64;

    Ok(100.0 - 100.0 * correct / rows as f64)
}
