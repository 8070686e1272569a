//! Configuration for the road segmentation pipeline.
//!
//! Every tunable value of the pipeline lives in one immutable tree of Burn
//! `Config` structs that is built once at start-up and handed to each stage.
//! The tree serialises to JSON through [`Config::save`] and [`Config::load`].

use std::path::{Path, PathBuf};

use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    error::{RoadSegError, RoadSegResult},
    model::RoadNetConfig,
};

/// Root configuration for training and prediction.
#[derive(Config, Debug)]
pub struct RoadSegConfig {
    /// Side length of the square patches classified by the network.
    /// Must be a positive multiple of 4 (two 2x poolings).
    #[config(default = 48)]
    pub patch_size: usize,
    /// Channels of the input images (RGB).
    #[config(default = 3)]
    pub num_channels: usize,
    /// Dataset layout and sizes.
    #[config(default = "DatasetConfig::new()")]
    pub dataset: DatasetConfig,
    /// Training loop settings.
    #[config(default = "TrainingConfig::new()")]
    pub training: TrainingConfig,
    /// Full-image prediction settings.
    #[config(default = "PredictionConfig::new()")]
    pub prediction: PredictionConfig,
}

/// Location and size of the training and test sets.
#[derive(Config, Debug)]
pub struct DatasetConfig {
    /// Root directory of the training data.
    #[config(default = "PathBuf::from(\"training\")")]
    pub data_dir: PathBuf,
    /// Sub-directory of `data_dir` holding the satellite images.
    #[config(default = "String::from(\"images\")")]
    pub images_dir: String,
    /// Sub-directory of `data_dir` holding the ground-truth masks.
    #[config(default = "String::from(\"groundtruth\")")]
    pub groundtruth_dir: String,
    /// Directory holding `test_<i>/test_<i>.png`.
    #[config(default = "PathBuf::from(\"test_set_images\")")]
    pub test_dir: PathBuf,
    /// Number of training images, indexed from 1.
    #[config(default = 5)]
    pub training_size: usize,
    /// Number of test images, indexed from 1.
    #[config(default = 5)]
    pub test_size: usize,
    /// Size of a validation split. Parsed and reported but not consumed by any stage.
    #[config(default = 30)]
    pub validation_size: usize,
}

/// Settings of the training loop.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 16)]
    pub batch_size: usize,
    #[config(default = 1)]
    pub num_epochs: usize,
    /// Learning rate before any decay.
    #[config(default = 0.01)]
    pub base_learning_rate: f64,
    /// Multiplicative decay applied per decay interval.
    #[config(default = 0.8)]
    pub decay_rate: f64,
    /// Samples per decay interval. `None` uses the training set size.
    #[config(default = "None")]
    pub decay_steps: Option<usize>,
    /// Decay in discrete steps instead of continuously.
    #[config(default = true)]
    pub staircase: bool,
    /// Weight of the L2 penalty on the fully connected parameters.
    #[config(default = 5e-4)]
    pub l2_regularization: f64,
    /// Report loss, learning rate and minibatch error every this many steps.
    #[config(default = 1000)]
    pub recording_step: usize,
    /// Persist the parameters every this many steps.
    #[config(default = 10000)]
    pub checkpoint_step: usize,
    /// Random seed. `None` draws one from the operating system.
    #[config(default = "None")]
    pub seed: Option<u64>,
    /// Restore parameters from the checkpoint instead of training.
    #[config(default = false)]
    pub restore_model: bool,
    /// Directory holding the checkpoint.
    #[config(default = "PathBuf::from(\"checkpoints\")")]
    pub checkpoint_dir: PathBuf,
    /// Checkpoint file name; `.mpk` is appended.
    #[config(default = "String::from(\"model\")")]
    pub checkpoint_name: String,
}

/// Settings of full-image prediction.
#[derive(Config, Debug)]
pub struct PredictionConfig {
    /// Patches classified per forward pass. Bounds peak memory.
    #[config(default = 10000)]
    pub batch_size: usize,
    /// Fill enclosed holes of the predicted label grid.
    #[config(default = true)]
    pub fill_holes: bool,
    /// Opacity of the red road mask in overlays.
    #[config(default = 0.2)]
    pub overlay_alpha: f32,
}

impl RoadSegConfig {
    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns [`RoadSegError::InvalidConfiguration`] naming the first offending value.
    pub fn validate(&self) -> RoadSegResult<()> {
        let invalid = |reason: String| Err(RoadSegError::InvalidConfiguration { reason });

        if self.patch_size == 0 || self.patch_size % 4 != 0 {
            return invalid(format!(
                "patch_size must be a positive multiple of 4, got {}",
                self.patch_size
            ));
        }
        if self.num_channels == 0 {
            return invalid("num_channels must be greater than 0".to_string());
        }

        let training = &self.training;
        if training.batch_size == 0 {
            return invalid("training batch_size must be greater than 0".to_string());
        }
        if training.num_epochs == 0 {
            return invalid("num_epochs must be greater than 0".to_string());
        }
        if !(training.base_learning_rate > 0.0) {
            return invalid(format!(
                "base_learning_rate must be positive, got {}",
                training.base_learning_rate
            ));
        }
        if !(training.decay_rate > 0.0 && training.decay_rate <= 1.0) {
            return invalid(format!(
                "decay_rate must lie in (0, 1], got {}",
                training.decay_rate
            ));
        }
        if training.decay_steps == Some(0) {
            return invalid("decay_steps must be greater than 0 when set".to_string());
        }
        if training.recording_step == 0 || training.checkpoint_step == 0 {
            return invalid("recording_step and checkpoint_step must be greater than 0".to_string());
        }
        if training.l2_regularization < 0.0 {
            return invalid("l2_regularization must not be negative".to_string());
        }

        let prediction = &self.prediction;
        if prediction.batch_size == 0 {
            return invalid("prediction batch_size must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&prediction.overlay_alpha) {
            return invalid(format!(
                "overlay_alpha must lie in [0, 1], got {}",
                prediction.overlay_alpha
            ));
        }

        Ok(())
    }

    /// Border added on each side of an image so every pixel has a full patch.
    pub const fn margin(&self) -> usize {
        self.patch_size / 2
    }

    /// Architecture of the patch classifier for this configuration.
    pub fn model_config(&self) -> RoadNetConfig {
        RoadNetConfig::new(self.patch_size).with_num_channels(self.num_channels)
    }
}

impl DatasetConfig {
    /// Path of training image `index` (1-based).
    pub fn image_path(&self, index: usize) -> PathBuf {
        self.data_dir
            .join(&self.images_dir)
            .join(satellite_image_name(index))
    }

    /// Path of the ground-truth mask of training image `index` (1-based).
    pub fn groundtruth_path(&self, index: usize) -> PathBuf {
        self.data_dir
            .join(&self.groundtruth_dir)
            .join(satellite_image_name(index))
    }

    /// Path of test image `index` (1-based).
    pub fn test_image_path(&self, index: usize) -> PathBuf {
        test_image_path(&self.test_dir, index)
    }
}

impl TrainingConfig {
    /// Random generator for sampling and permutations.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// File name of a training image or mask: `satImage_001.png` for index 1.
pub fn satellite_image_name(index: usize) -> String {
    format!("satImage_{index:03}.png")
}

/// `<dir>/test_<i>/test_<i>.png`.
pub fn test_image_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("test_{index}"))
        .join(format!("test_{index}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(RoadSegConfig::new().validate().is_ok());
    }

    #[test]
    fn patch_size_must_be_a_multiple_of_four() {
        let config = RoadSegConfig::new().with_patch_size(6);

        match config.validate() {
            Err(RoadSegError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("patch_size"));
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn decay_rate_above_one_is_rejected() {
        let config =
            RoadSegConfig::new().with_training(TrainingConfig::new().with_decay_rate(1.5));

        assert!(matches!(
            config.validate(),
            Err(RoadSegError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn zero_prediction_batch_is_rejected() {
        let config =
            RoadSegConfig::new().with_prediction(PredictionConfig::new().with_batch_size(0));

        assert!(config.validate().is_err());
    }

    #[test]
    fn file_layout_matches_the_dataset_convention() {
        let dataset = DatasetConfig::new();

        assert_eq!(
            dataset.image_path(7),
            PathBuf::from("training/images/satImage_007.png")
        );
        assert_eq!(
            dataset.groundtruth_path(42),
            PathBuf::from("training/groundtruth/satImage_042.png")
        );
        assert_eq!(
            dataset.test_image_path(3),
            PathBuf::from("test_set_images/test_3/test_3.png")
        );
    }

    #[test]
    fn margin_is_half_the_patch() {
        assert_eq!(RoadSegConfig::new().with_patch_size(16).margin(), 8);
    }

    #[test]
    fn seeded_generators_repeat() {
        use rand::Rng;

        let training = TrainingConfig::new().with_seed(Some(7));
        let a: u64 = training.rng().random();
        let b: u64 = training.rng().random();
        assert_eq!(a, b);
    }

    #[test]
    fn configuration_survives_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = RoadSegConfig::new()
            .with_patch_size(8)
            .with_training(TrainingConfig::new().with_seed(Some(3)));

        config.save(&path).unwrap();
        let loaded = RoadSegConfig::load(&path).unwrap();

        assert_eq!(loaded.patch_size, 8);
        assert_eq!(loaded.training.seed, Some(3));
        assert_eq!(loaded.dataset.validation_size, 30);
    }
}
