//! Road Segmentation Training
//!
//! Trains the patch classifier on the satellite training set (or restores it
//! from the last checkpoint), then writes predictions for every training and
//! test image.
//!
//! ## Usage
//!
//! ```bash
//! # Train with the default configuration
//! cargo run --release --bin train
//!
//! # Train with a run configuration file and a few overrides
//! cargo run --release --bin train -- --config run.json --num-epochs 3 --seed 7
//!
//! # Skip training and reuse checkpoints/model.mpk
//! cargo run --release --bin train -- --restore
//!
//! # Train on the GPU
//! cargo run --release --bin train --features wgpu --no-default-features
//! ```

use anyhow::{ensure, Result};
use clap::Parser;
use roadseg::model::inference_model;
use roadseg_demos::{
    create_device, get_backend_name, init_logging,
    pipeline::{train_or_restore, write_test_predictions, write_training_predictions},
    RunConfig, SelectedBackend, TrainingBackend,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the training data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the test image directory
    #[arg(long)]
    test_dir: Option<PathBuf>,

    /// Override the number of training images
    #[arg(long)]
    training_size: Option<usize>,

    /// Override the number of test images
    #[arg(long)]
    test_size: Option<usize>,

    /// Override the patch size
    #[arg(long)]
    patch_size: Option<usize>,

    /// Override the training batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override the number of epochs
    #[arg(long)]
    num_epochs: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Restore the checkpoint instead of training
    #[arg(long)]
    restore: bool,

    /// Also write each image next to its prediction
    #[arg(long)]
    concatenate: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut run = RunConfig::load(args.config.as_deref())?;
    let config = &mut run.pipeline;

    // Apply command line overrides
    if let Some(data_dir) = args.data_dir {
        config.dataset.data_dir = data_dir;
    }
    if let Some(test_dir) = args.test_dir {
        config.dataset.test_dir = test_dir;
    }
    if let Some(training_size) = args.training_size {
        config.dataset.training_size = training_size;
    }
    if let Some(test_size) = args.test_size {
        config.dataset.test_size = test_size;
    }
    if let Some(patch_size) = args.patch_size {
        config.patch_size = patch_size;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(num_epochs) = args.num_epochs {
        config.training.num_epochs = num_epochs;
    }
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }
    if let Some(checkpoint_dir) = args.checkpoint_dir {
        config.training.checkpoint_dir = checkpoint_dir;
    }
    config.training.restore_model |= args.restore;
    run.save_concatenated |= args.concatenate;

    if !config.training.restore_model {
        ensure!(
            config.dataset.data_dir.exists(),
            "Training data directory does not exist: {}",
            config.dataset.data_dir.display()
        );
    }

    let device = create_device();
    tracing::info!(backend = get_backend_name(), "using backend");

    let model = train_or_restore::<TrainingBackend>(&run.pipeline, &device)?;
    let model = inference_model(&model);

    let training = write_training_predictions::<SelectedBackend, _>(&run, &model, &device)?;
    let test = write_test_predictions::<SelectedBackend, _>(&run, &model, &device)?;
    tracing::info!(
        training_outputs = training.len(),
        test_outputs = test.len(),
        "predictions written"
    );

    Ok(())
}
