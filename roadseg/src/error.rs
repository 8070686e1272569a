use std::path::PathBuf;

use thiserror::Error;

/// The error type for road segmentation operations.
///
/// Covers configuration problems, violated sampling preconditions, file access
/// and checkpoint failures. Patch-extraction shape violations are not part of
/// this enum: they indicate a coordinate bug and abort with a panic.
#[derive(Error, Debug)]
pub enum RoadSegError {
    /// A configuration value is out of range or inconsistent with another.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The balanced sampler expects background pixels to be the majority class
    /// and at least one road pixel to exist.
    #[error(
        "Cannot balance classes: {background} background pixels vs {road} road pixels \
         (background must be the majority and road must be non-empty)"
    )]
    ClassImbalance {
        /// Number of background coordinates.
        background: usize,
        /// Number of road coordinates.
        road: usize,
    },

    /// An image without any spatial extent cannot be padded.
    #[error("Image has no pixels: {height}x{width} with {channels} channels")]
    EmptyImage {
        height: usize,
        width: usize,
        channels: usize,
    },

    /// The stepping scheme needs more samples than fit in one batch.
    #[error("Training set of {size} samples must be larger than the batch size {batch_size}")]
    TrainingSetTooSmall { size: usize, batch_size: usize },

    /// No image/mask pair could be loaded.
    #[error("No training image/mask pairs found under {}", dir.display())]
    NoTrainingData { dir: PathBuf },

    /// Decoding an image file failed.
    #[error("Failed to load image {}: {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },

    /// Saving or restoring model parameters failed.
    #[error("Checkpoint operation failed for {}: {reason}", path.display())]
    Checkpoint { path: PathBuf, reason: String },

    /// Reading tensor data back to the host failed.
    #[error("Tensor data conversion failed: {reason}")]
    TensorData { reason: String },

    /// Two arrays that must agree in shape do not.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

/// A specialized `Result` type for road segmentation operations.
pub type RoadSegResult<T> = Result<T, RoadSegError>;
