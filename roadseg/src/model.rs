//! The patch classifier: two convolution/pooling stages followed by two fully
//! connected layers producing road/background logits.

use burn::{
    module::{AutodiffModule, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{activation::log_softmax, backend::AutodiffBackend, ElementConversion},
};
use roadseg_ops::{trunc_normal, TensorExtraOps};

use crate::labels::NUM_LABELS;

/// Bias of every layer except the first convolution.
const BIAS_INIT: f64 = 0.1;

/// Configuration of [`RoadNet`].
#[derive(Config, Debug)]
pub struct RoadNetConfig {
    /// Side length of the input patches. A multiple of 4.
    pub patch_size: usize,
    #[config(default = 3)]
    pub num_channels: usize,
    #[config(default = 5)]
    pub kernel_size: usize,
    #[config(default = 32)]
    pub conv1_channels: usize,
    #[config(default = 64)]
    pub conv2_channels: usize,
    #[config(default = 512)]
    pub hidden_size: usize,
    /// Standard deviation of the truncated normal weight initialisation.
    #[config(default = 0.1)]
    pub init_std: f64,
}

impl RoadNetConfig {
    /// Features entering the first fully connected layer after two 2x poolings.
    pub const fn flattened_size(&self) -> usize {
        let side = self.patch_size / 4;
        side * side * self.conv2_channels
    }

    /// Initializes a `RoadNet` module.
    ///
    /// Weights are drawn from a truncated normal distribution. The first
    /// convolution starts with zero biases, every other layer with 0.1.
    pub fn init<B: Backend>(&self, device: &B::Device) -> RoadNet<B> {
        let kernel = [self.kernel_size, self.kernel_size];

        let mut conv1 = Conv2dConfig::new([self.num_channels, self.conv1_channels], kernel)
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(Initializer::Zeros)
            .init(device);
        conv1.weight = Param::from_tensor(trunc_normal(
            [self.conv1_channels, self.num_channels, self.kernel_size, self.kernel_size],
            0.0,
            self.init_std,
            device,
        ));

        let mut conv2 = Conv2dConfig::new([self.conv1_channels, self.conv2_channels], kernel)
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(Initializer::Constant { value: BIAS_INIT })
            .init(device);
        conv2.weight = Param::from_tensor(trunc_normal(
            [self.conv2_channels, self.conv1_channels, self.kernel_size, self.kernel_size],
            0.0,
            self.init_std,
            device,
        ));

        let mut fc1 = LinearConfig::new(self.flattened_size(), self.hidden_size)
            .with_initializer(Initializer::Constant { value: BIAS_INIT })
            .init(device);
        fc1.weight = Param::from_tensor(trunc_normal(
            [self.flattened_size(), self.hidden_size],
            0.0,
            self.init_std,
            device,
        ));

        let mut fc2 = LinearConfig::new(self.hidden_size, NUM_LABELS)
            .with_initializer(Initializer::Constant { value: BIAS_INIT })
            .init(device);
        fc2.weight = Param::from_tensor(trunc_normal(
            [self.hidden_size, NUM_LABELS],
            0.0,
            self.init_std,
            device,
        ));

        RoadNet {
            conv1,
            conv2,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1,
            fc2,
            activation: Relu::new(),
        }
    }
}

/// Shallow convolutional network classifying the centre of a patch.
#[derive(Module, Debug)]
pub struct RoadNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> RoadNet<B> {
    /// Maps `[N, S, S, C]` patches to `[N, 2]` logits.
    pub fn forward(&self, patches: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = patches.permute([0, 3, 1, 2]);

        let x = self.conv1.forward(x);
        let x = self.pool.forward(self.activation.forward(x));
        let x = self.conv2.forward(x);
        let x = self.pool.forward(self.activation.forward(x));

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Sum of `l2_loss` over the weights and biases of both fully connected layers.
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let mut penalty = self.fc1.weight.val().l2_loss() + self.fc2.weight.val().l2_loss();
        for bias in [&self.fc1.bias, &self.fc2.bias].into_iter().flatten() {
            penalty = penalty + bias.val().l2_loss();
        }
        penalty
    }

    /// Mean softmax cross-entropy against one-hot `targets` plus the weighted
    /// L2 penalty.
    pub fn loss(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 2>,
        l2_weight: f64,
    ) -> Tensor<B, 1> {
        cross_entropy(logits, targets) + self.l2_penalty().mul_scalar(l2_weight)
    }
}

impl<B: AutodiffBackend> RoadNet<B> {
    /// L2 norm of the gradient of every parameter, in layer order.
    ///
    /// Parameters without a gradient are skipped.
    pub fn gradient_norms(&self, grads: &B::Gradients) -> Vec<(&'static str, f32)> {
        fn norm<B: AutodiffBackend, const D: usize>(
            tensor: Tensor<B, D>,
            grads: &B::Gradients,
        ) -> Option<f32> {
            tensor.grad(grads).map(|grad| {
                grad.powf_scalar(2.0)
                    .sum()
                    .sqrt()
                    .into_scalar()
                    .elem::<f32>()
            })
        }

        let mut norms = Vec::with_capacity(8);
        let mut push = |name: &'static str, value: Option<f32>| {
            if let Some(value) = value {
                norms.push((name, value));
            }
        };

        push("conv1.weight", norm(self.conv1.weight.val(), grads));
        push("conv1.bias", self.conv1.bias.as_ref().and_then(|b| norm(b.val(), grads)));
        push("conv2.weight", norm(self.conv2.weight.val(), grads));
        push("conv2.bias", self.conv2.bias.as_ref().and_then(|b| norm(b.val(), grads)));
        push("fc1.weight", norm(self.fc1.weight.val(), grads));
        push("fc1.bias", self.fc1.bias.as_ref().and_then(|b| norm(b.val(), grads)));
        push("fc2.weight", norm(self.fc2.weight.val(), grads));
        push("fc2.bias", self.fc2.bias.as_ref().and_then(|b| norm(b.val(), grads)));
        norms
    }
}

/// Mean over the batch of `-sum(targets * log_softmax(logits))`.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let per_sample: Tensor<B, 2> = (targets * log_softmax(logits, 1)).sum_dim(1);
    per_sample.neg().mean()
}

/// Anything that turns a batch of `[N, S, S, C]` patches into `[N, 2]` logits.
///
/// Prediction is written against this trait so it can run with the trained
/// network or with any stand-in that honours the same contract.
pub trait PatchClassifier<B: Backend> {
    fn logits(&self, patches: Tensor<B, 4>) -> Tensor<B, 2>;
}

impl<B: Backend> PatchClassifier<B> for RoadNet<B> {
    fn logits(&self, patches: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(patches)
    }
}

/// Inference copy of a trained network, detached from the autodiff graph.
pub fn inference_model<B: AutodiffBackend>(model: &RoadNet<B>) -> RoadNet<B::InnerBackend> {
    model.valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArray, Autodiff};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn forward_maps_patches_to_two_logits() {
        let device = Default::default();
        let model = RoadNetConfig::new(8).init::<TestBackend>(&device);
        let patches = Tensor::<TestBackend, 4>::ones([3, 8, 8, 3], &device);

        let logits = model.forward(patches);

        assert_eq!(logits.dims(), [3, NUM_LABELS]);
    }

    #[test]
    fn flattened_size_follows_patch_size() {
        assert_eq!(RoadNetConfig::new(16).flattened_size(), 4 * 4 * 64);
        assert_eq!(RoadNetConfig::new(48).flattened_size(), 12 * 12 * 64);
    }

    #[test]
    fn weights_stay_within_two_standard_deviations() {
        let device = Default::default();
        let model = RoadNetConfig::new(8).init::<TestBackend>(&device);

        let weights = model.fc1.weight.val().to_data().to_vec::<f32>().unwrap();
        assert!(weights.iter().all(|w| w.abs() <= 0.2 + 1e-6));
    }

    #[test]
    fn biases_follow_the_initialisation_scheme() {
        let device = Default::default();
        let model = RoadNetConfig::new(8).init::<TestBackend>(&device);

        let conv1 = model.conv1.bias.as_ref().unwrap().val().to_data().to_vec::<f32>().unwrap();
        assert!(conv1.iter().all(|&b| b == 0.0));

        let fc2 = model.fc2.bias.as_ref().unwrap().val().to_data().to_vec::<f32>().unwrap();
        assert!(fc2.iter().all(|&b| (b - 0.1).abs() < 1e-6));
    }

    #[test]
    fn cross_entropy_of_uniform_logits_is_ln_two() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]],
            &device,
        );

        let loss: f32 = cross_entropy(logits, targets).into_scalar();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn loss_adds_the_weighted_penalty() {
        let device = Default::default();
        let model = RoadNetConfig::new(4).init::<TestBackend>(&device);
        let logits = Tensor::<TestBackend, 2>::zeros([1, 2], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0]], &device);

        let penalty: f32 = model.l2_penalty().into_scalar();
        let loss: f32 = model.loss(logits, targets, 0.5).into_scalar();

        assert!(penalty > 0.0);
        assert!((loss - (std::f32::consts::LN_2 + 0.5 * penalty)).abs() < 1e-4);
    }

    #[test]
    fn every_parameter_receives_a_gradient() {
        let device = Default::default();
        let model = RoadNetConfig::new(4).init::<TestAutodiffBackend>(&device);
        let patches = Tensor::<TestAutodiffBackend, 4>::ones([2, 4, 4, 3], &device);
        let targets =
            Tensor::<TestAutodiffBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);

        let logits = model.forward(patches);
        let grads = model.loss(logits, targets, 5e-4).backward();
        let norms = model.gradient_norms(&grads);

        assert_eq!(norms.len(), 8);
        assert!(norms.iter().all(|(_, norm)| norm.is_finite()));
    }

    #[test]
    fn inference_model_matches_the_trained_one() {
        let device = Default::default();
        let model = RoadNetConfig::new(4).init::<TestAutodiffBackend>(&device);
        let patches = Tensor::<TestBackend, 4>::ones([1, 4, 4, 3], &device);

        let expected = model
            .forward(Tensor::from_inner(patches.clone()))
            .inner()
            .to_data()
            .to_vec::<f32>()
            .unwrap();
        let actual = inference_model(&model)
            .logits(patches)
            .to_data()
            .to_vec::<f32>()
            .unwrap();

        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-5);
        }
    }
}
