//! # RoadSeg
//!
//! Patch-based road segmentation of satellite images, built on the Burn deep
//! learning framework.
//!
//! A small convolutional network classifies the square patch around a pixel
//! as road or background. Training draws a class-balanced set of pixel
//! coordinates from ground-truth masks; prediction classifies the patch around
//! every pixel of an image and stitches the results back into a label grid.
//!
//! ## Modules
//!
//! - `geometry`: pixel coordinates, the shared scan order and image padding.
//! - `patch` and `batch`: patch extraction and batch assembly.
//! - `labels` and `sampler`: per-class coordinate lists and class balancing.
//! - `model`, `schedule`, `metrics`, `training`: the network and its training loop.
//! - `prediction`, `grid`, `visualize`: full-image prediction and its outputs.
//! - `dataset` and `checkpoint`: file input and parameter persistence.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod dataset;
mod error;
pub mod geometry;
pub mod grid;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod patch;
pub mod prediction;
pub mod sampler;
pub mod schedule;
pub mod training;
pub mod visualize;

#[doc(inline)]
pub use batch::{PatchBatch, PatchBatcher};
#[doc(inline)]
pub use checkpoint::{CheckpointStore, FileCheckpointStore};
#[doc(inline)]
pub use config::{DatasetConfig, PredictionConfig, RoadSegConfig, TrainingConfig};
#[doc(inline)]
pub use error::{RoadSegError, RoadSegResult};
#[doc(inline)]
pub use geometry::{pad, scan_order, PaddedImage, PixelCoord, SampleCoord};
#[doc(inline)]
pub use grid::LabelGrid;
#[doc(inline)]
pub use labels::{index_labels, LabelClassLists, PixelClass};
#[doc(inline)]
pub use model::{PatchClassifier, RoadNet, RoadNetConfig, RoadNetRecord};
#[doc(inline)]
pub use prediction::Predictor;
#[doc(inline)]
pub use sampler::{balance, TrainingSample, TrainingSet};
#[doc(inline)]
pub use training::{init_model, StepReport, Trainer, TrainingOutcome};
