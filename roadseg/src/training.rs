//! The training loop: per-epoch permutations, fixed-modulus batch offsets,
//! staircase learning-rate decay, periodic reports and checkpoints.

use burn::{
    data::dataloader::batcher::Batcher,
    optim::{GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend, ElementConversion},
};
use rand::{seq::SliceRandom, Rng};

use crate::{
    batch::PatchBatcher,
    checkpoint::CheckpointStore,
    config::{RoadSegConfig, TrainingConfig},
    error::{RoadSegError, RoadSegResult},
    metrics::error_rate,
    model::RoadNet,
    sampler::TrainingSet,
    schedule::ExponentialDecay,
};

/// Values recorded at a reporting step, taken before the parameter update.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub epoch: usize,
    /// Step within the epoch.
    pub step: usize,
    /// Steps taken since training started.
    pub global_step: usize,
    pub loss: f64,
    pub learning_rate: f64,
    /// Minibatch error in percent.
    pub error_rate: f64,
}

/// Result of [`Trainer::fit`].
#[derive(Debug)]
pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: RoadNet<B>,
    pub global_steps: usize,
    pub reports: Vec<StepReport>,
}

/// Seeds the backend when a seed is configured and builds a fresh network.
pub fn init_model<B: Backend>(config: &RoadSegConfig, device: &B::Device) -> RoadNet<B> {
    if let Some(seed) = config.training.seed {
        B::seed(seed);
    }
    config.model_config().init(device)
}

/// Start of batch `step` within an epoch's permutation.
///
/// The modulus is `len - batch_size`, not `len`: when `len` is a multiple of
/// `batch_size` the last step of an epoch wraps to 0 and repeats the first batch.
pub(crate) const fn batch_offset(step: usize, batch_size: usize, len: usize) -> usize {
    (step * batch_size) % (len - batch_size)
}

/// Drives plain gradient descent over a balanced [`TrainingSet`].
#[derive(Debug)]
pub struct Trainer<S> {
    config: TrainingConfig,
    store: S,
}

impl<S: CheckpointStore> Trainer<S> {
    pub fn new(config: TrainingConfig, store: S) -> Self {
        Self { config, store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Trains `model` for the configured number of epochs.
    ///
    /// Each epoch draws a fresh permutation of the training indices and takes
    /// `len / batch_size` steps. Step `k` reads `batch_size` indices of the
    /// permutation starting at `(k * batch_size) % (len - batch_size)`, so the
    /// tail of the permutation past `len - batch_size` is never the start of a
    /// batch. The parameters are saved every `checkpoint_step` steps and once
    /// more when training ends.
    ///
    /// # Errors
    ///
    /// Returns [`RoadSegError::TrainingSetTooSmall`] when the set does not
    /// exceed one batch, and checkpoint errors from the store.
    pub fn fit<B: AutodiffBackend, R: Rng + ?Sized>(
        &self,
        mut model: RoadNet<B>,
        training_set: &TrainingSet,
        batcher: &PatchBatcher<B>,
        rng: &mut R,
        device: &B::Device,
    ) -> RoadSegResult<TrainingOutcome<B>> {
        let config = &self.config;
        let train_size = training_set.len();
        let batch_size = config.batch_size;
        if train_size <= batch_size {
            return Err(RoadSegError::TrainingSetTooSmall {
                size: train_size,
                batch_size,
            });
        }

        let steps_per_epoch = train_size / batch_size;
        let schedule = ExponentialDecay::from_config(config, train_size);
        let mut optim = SgdConfig::new().init::<B, RoadNet<B>>();

        tracing::info!(
            train_size,
            batch_size,
            steps_per_epoch,
            num_epochs = config.num_epochs,
            "starting training"
        );

        let mut reports = Vec::new();
        let mut global_step = 0;
        for epoch in 0..config.num_epochs {
            let mut permutation: Vec<usize> = (0..train_size).collect();
            permutation.shuffle(rng);
            tracing::info!(epoch, "Starting epoch");

            for step in 0..steps_per_epoch {
                let offset = batch_offset(step, batch_size, train_size);
                let samples = training_set.select(&permutation[offset..offset + batch_size]);
                let batch = batcher.batch(samples, device);
                let learning_rate = schedule.rate_at_step(global_step, batch_size);

                let logits = model.forward(batch.patches);
                let loss = model.loss(
                    logits.clone(),
                    batch.labels.clone(),
                    config.l2_regularization,
                );
                let grads = loss.backward();

                if tracing::enabled!(tracing::Level::DEBUG) {
                    for (parameter, norm) in model.gradient_norms(&grads) {
                        tracing::debug!(global_step, parameter, norm, "gradient norm");
                    }
                }

                if step % config.recording_step == 0 {
                    let predictions = softmax(logits.inner(), 1);
                    let report = StepReport {
                        epoch,
                        step,
                        global_step,
                        loss: loss.into_scalar().elem::<f64>(),
                        learning_rate,
                        error_rate: error_rate(predictions, batch.labels.inner())?,
                    };
                    tracing::info!(
                        epoch,
                        step,
                        global_step,
                        loss = report.loss,
                        learning_rate = report.learning_rate,
                        error_rate = report.error_rate,
                        "minibatch"
                    );
                    reports.push(report);
                }

                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(learning_rate, model, grads);
                global_step += 1;

                if step % config.checkpoint_step == 0 {
                    self.store.save(&model)?;
                }
            }
        }

        self.store.save(&model)?;
        tracing::info!(global_steps = global_step, "training completed");

        Ok(TrainingOutcome {
            model,
            global_steps: global_step,
            reports,
        })
    }
}
