//! Road Segmentation Prediction
//!
//! Segments satellite images with a saved checkpoint. For every input image
//! `<stem>.png` it writes `<stem>_prediction.png` (road in white) and
//! `<stem>_overlay.png` (road tinted red).
//!
//! ## Usage
//!
//! ```bash
//! # Segment a single image
//! cargo run --release --bin predict -- checkpoints/model.mpk image.png
//!
//! # Segment a directory of images
//! cargo run --release --bin predict -- checkpoints/model.mpk images/ --output outputs/
//!
//! # Keep the raw thresholded grid
//! cargo run --release --bin predict -- checkpoints/model.mpk image.png --no-fill-holes
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use roadseg::{init_model, CheckpointStore, FileCheckpointStore, Predictor, RoadNet};
use roadseg_demos::{
    create_device, get_backend_name, init_logging, pipeline::write_image_outputs, RunConfig,
    SelectedBackend, SelectedDevice,
};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the checkpoint file
    model: PathBuf,

    /// Path to the input image or directory
    input: PathBuf,

    /// Output directory for results
    #[arg(short, long, default_value = "outputs")]
    output: PathBuf,

    /// Run configuration file path (JSON); must match the trained network
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the patch size
    #[arg(long)]
    patch_size: Option<usize>,

    /// Override the number of patches per forward pass
    #[arg(long)]
    batch_size: Option<usize>,

    /// Disable filling enclosed holes
    #[arg(long)]
    no_fill_holes: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut run = RunConfig::load(args.config.as_deref())?;
    let config = &mut run.pipeline;
    if let Some(patch_size) = args.patch_size {
        config.patch_size = patch_size;
    }
    if let Some(batch_size) = args.batch_size {
        config.prediction.batch_size = batch_size;
    }
    config.prediction.fill_holes &= !args.no_fill_holes;
    config.validate()?;

    if !args.model.is_file() {
        bail!("Model file does not exist: {}", args.model.display());
    }
    if !args.input.exists() {
        bail!("Input path does not exist: {}", args.input.display());
    }
    let images = collect_images(&args.input)?;
    if images.is_empty() {
        bail!("No images found in {}", args.input.display());
    }

    fs::create_dir_all(&args.output).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            args.output.display()
        )
    })?;

    let device = create_device();
    tracing::info!(backend = get_backend_name(), "using backend");

    let model = load_model(&args.model, &run, &device)?;
    let config = &run.pipeline;
    let predictor = Predictor::new(&model, config.patch_size, &config.prediction);

    for image_path in &images {
        let start_time = Instant::now();
        let outputs = write_image_outputs(
            &predictor,
            image_path,
            &args.output,
            config.prediction.overlay_alpha,
            &device,
        )?;
        tracing::info!(
            image = %image_path.display(),
            outputs = outputs.len(),
            seconds = start_time.elapsed().as_secs_f32(),
            "processed image"
        );
    }

    tracing::info!(count = images.len(), "prediction completed");
    Ok(())
}

/// Load the trained network
fn load_model(
    model_path: &Path,
    run: &RunConfig,
    device: &SelectedDevice,
) -> Result<RoadNet<SelectedBackend>> {
    tracing::info!(path = %model_path.display(), "loading model");
    let store = FileCheckpointStore::from_file(model_path);
    let model = init_model::<SelectedBackend>(&run.pipeline, device);
    store
        .load(model, device)
        .context("Failed to load model weights")
}

/// Collect the image files at `input`, sorted by name
fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let entries = fs::read_dir(input)
        .with_context(|| format!("Failed to read directory: {}", input.display()))?;

    let mut image_paths = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();

        if path.is_file() {
            if let Some(extension) = path.extension() {
                let ext = extension.to_string_lossy().to_lowercase();
                if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    image_paths.push(path);
                }
            }
        }
    }

    image_paths.sort();
    Ok(image_paths)
}
