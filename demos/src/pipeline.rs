//! End-to-end steps shared by the command line tools: obtain a trained
//! network, then write prediction images for the training and test sets.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use image::{DynamicImage, Rgb32FImage};
use roadseg::{
    balance,
    dataset::{load_rgb_image, load_training_images, rgb_to_tensor},
    index_labels, init_model,
    visualize::{concatenate_images, make_overlay},
    CheckpointStore, FileCheckpointStore, LabelGrid, PatchBatcher, PatchClassifier, Predictor,
    RoadNet, RoadSegConfig, Trainer,
};

use crate::config::RunConfig;

/// Trains a fresh network, or restores it from the checkpoint when
/// `restore_model` is set.
///
/// # Errors
///
/// Returns an error for an invalid configuration, missing training data, a
/// violated sampling precondition or a checkpoint failure. A failed restore
/// never falls back to training.
pub fn train_or_restore<B: AutodiffBackend>(
    config: &RoadSegConfig,
    device: &B::Device,
) -> Result<RoadNet<B>> {
    config.validate()?;
    tracing::info!(
        patch_size = config.patch_size,
        training_size = config.dataset.training_size,
        test_size = config.dataset.test_size,
        validation_size = config.dataset.validation_size,
        "pipeline configuration"
    );

    let training = &config.training;
    let store = FileCheckpointStore::new(&training.checkpoint_dir, &training.checkpoint_name);

    if training.restore_model {
        let model = store
            .load(init_model::<B>(config, device), device)
            .context("Failed to restore model")?;
        return Ok(model);
    }

    let images = load_training_images::<B>(&config.dataset, device)?;
    let lists = index_labels(&images.masks)?;
    let mut rng = training.rng();
    let training_set = balance(lists, &mut rng)?;
    let batcher = PatchBatcher::new(images.images, config.patch_size)?;

    let model = init_model::<B>(config, device);
    let outcome = Trainer::new(training.clone(), store).fit(
        model,
        &training_set,
        &batcher,
        &mut rng,
        device,
    )?;
    Ok(outcome.model)
}

/// Loads `path` and predicts its label grid.
///
/// # Errors
///
/// Returns an error if the image cannot be loaded or prediction fails.
pub fn predict_file<B: Backend, M: PatchClassifier<B>>(
    predictor: &Predictor<'_, B, M>,
    path: &Path,
    device: &B::Device,
) -> Result<(Rgb32FImage, LabelGrid)> {
    let image = load_rgb_image(path)?;
    let grid = predictor
        .predict(rgb_to_tensor::<B>(&image, device))
        .with_context(|| format!("Failed to predict {}", path.display()))?;
    Ok((image, grid))
}

/// Writes the road mask of `grid`, road pixels white.
fn save_prediction(grid: &LabelGrid, path: &Path) -> Result<()> {
    grid.inverted()
        .to_luma_image()
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))
}

fn save_overlay(image: &Rgb32FImage, grid: &LabelGrid, alpha: f32, path: &Path) -> Result<()> {
    make_overlay(image, &grid.inverted(), alpha)?
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))
}

fn save_concatenated(image: &Rgb32FImage, grid: &LabelGrid, path: &Path) -> Result<()> {
    let prediction = DynamicImage::ImageLuma8(grid.inverted().to_luma_image());
    concatenate_images(image, &prediction)?
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))
}

fn create_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

/// Predicts every training image and writes `prediction_<i>.png`.
///
/// Missing images are skipped with a warning.
///
/// # Errors
///
/// Returns an error if an output cannot be written or prediction fails.
pub fn write_training_predictions<B: Backend, M: PatchClassifier<B>>(
    run: &RunConfig,
    model: &M,
    device: &B::Device,
) -> Result<Vec<PathBuf>> {
    let config = &run.pipeline;
    let predictor = Predictor::new(model, config.patch_size, &config.prediction);
    create_output_dir(&run.training_output_dir)?;

    let mut written = Vec::new();
    for id in 1..=config.dataset.training_size {
        let path = config.dataset.image_path(id);
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "training image missing, skipping");
            continue;
        }
        tracing::info!(id, "predicting training image");
        let (image, grid) = predict_file(&predictor, &path, device)?;

        let output = run.training_output_dir.join(format!("prediction_{id}.png"));
        save_prediction(&grid, &output)?;
        written.push(output);

        if run.save_concatenated {
            let output = run.training_output_dir.join(format!("concat_{id}.png"));
            save_concatenated(&image, &grid, &output)?;
            written.push(output);
        }
    }
    Ok(written)
}

/// Predicts every test image and writes `prediction_<i>.png` and
/// `overlay_<i>.png`.
///
/// Missing images are skipped with a warning.
///
/// # Errors
///
/// Returns an error if an output cannot be written or prediction fails.
pub fn write_test_predictions<B: Backend, M: PatchClassifier<B>>(
    run: &RunConfig,
    model: &M,
    device: &B::Device,
) -> Result<Vec<PathBuf>> {
    let config = &run.pipeline;
    let predictor = Predictor::new(model, config.patch_size, &config.prediction);
    create_output_dir(&run.test_output_dir)?;

    let mut written = Vec::new();
    for id in 1..=config.dataset.test_size {
        let path = config.dataset.test_image_path(id);
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "test image missing, skipping");
            continue;
        }
        tracing::info!(id, "predicting test image");
        let (image, grid) = predict_file(&predictor, &path, device)?;

        let prediction = run.test_output_dir.join(format!("prediction_{id}.png"));
        save_prediction(&grid, &prediction)?;
        let overlay = run.test_output_dir.join(format!("overlay_{id}.png"));
        save_overlay(&image, &grid, config.prediction.overlay_alpha, &overlay)?;
        written.extend([prediction, overlay]);

        if run.save_concatenated {
            let output = run.test_output_dir.join(format!("concat_{id}.png"));
            save_concatenated(&image, &grid, &output)?;
            written.push(output);
        }
    }
    Ok(written)
}

/// Writes the outputs of a single image: `<stem>_prediction.png` and
/// `<stem>_overlay.png` in `output_dir`.
///
/// # Errors
///
/// Returns an error if the image cannot be loaded, predicted or written.
pub fn write_image_outputs<B: Backend, M: PatchClassifier<B>>(
    predictor: &Predictor<'_, B, M>,
    path: &Path,
    output_dir: &Path,
    overlay_alpha: f32,
    device: &B::Device,
) -> Result<Vec<PathBuf>> {
    let (image, grid) = predict_file(predictor, path, device)?;
    let stem = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let prediction = output_dir.join(format!("{stem}_prediction.png"));
    save_prediction(&grid, &prediction)?;
    let overlay = output_dir.join(format!("{stem}_overlay.png"));
    save_overlay(&image, &grid, overlay_alpha, &overlay)?;
    Ok(vec![prediction, overlay])
}
