//! Run configuration for the command line tools.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use roadseg::RoadSegConfig;
use serde::{Deserialize, Serialize};

/// Pipeline settings plus where the command line tools write their outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pipeline configuration.
    pub pipeline: RoadSegConfig,
    /// Directory receiving `prediction_<i>.png` for the training images.
    pub training_output_dir: PathBuf,
    /// Directory receiving `prediction_<i>.png` and `overlay_<i>.png` for the test images.
    pub test_output_dir: PathBuf,
    /// Also write `concat_<i>.png`, the image beside its prediction.
    pub save_concatenated: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pipeline: RoadSegConfig::new(),
            training_output_dir: PathBuf::from("predictions_training"),
            test_output_dir: PathBuf::from("predictions_test"),
            save_concatenated: false,
        }
    }
}

impl RunConfig {
    /// Reads a JSON run configuration, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
