//! Exponential learning-rate decay.

use crate::config::TrainingConfig;

/// `base_rate * decay_rate ^ (position / decay_steps)`, where `position` counts
/// samples seen so far. With `staircase` the exponent is floored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    pub base_rate: f64,
    pub decay_rate: f64,
    pub decay_steps: usize,
    pub staircase: bool,
}

impl ExponentialDecay {
    /// Schedule of `config`, decaying once per `train_size` samples unless the
    /// configuration names its own interval.
    pub fn from_config(config: &TrainingConfig, train_size: usize) -> Self {
        Self {
            base_rate: config.base_learning_rate,
            decay_rate: config.decay_rate,
            decay_steps: config.decay_steps.unwrap_or(train_size).max(1),
            staircase: config.staircase,
        }
    }

    /// Learning rate after `position` samples.
    pub fn rate(&self, position: usize) -> f64 {
        let exponent = if self.staircase {
            (position / self.decay_steps) as f64
        } else {
            position as f64 / self.decay_steps as f64
        };
        self.base_rate * self.decay_rate.powf(exponent)
    }

    /// Learning rate at global step `step` with `batch_size` samples per step.
    pub fn rate_at_step(&self, step: usize, batch_size: usize) -> f64 {
        self.rate(step * batch_size)
    }
}
