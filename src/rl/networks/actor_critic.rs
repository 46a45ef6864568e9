//! Actor-Critic Network
//!
//! Shared convolutional trunk with a softmax action head and a linear value
//! head. Both heads backpropagate into the same trunk parameters.

use std::collections::BTreeMap;

use burn::module::{Ignored, Param};
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::TensorData;

use crate::error::{A3cError, Result as A3cResult};
use crate::frame::Frame;
use crate::rl::core::NUM_ACTIONS;
use crate::rl::gradients::{GradientMap, GradientTensor};

/// Kernel width of both convolution stages
pub const CONV_KERNEL: usize = 5;
/// Stride of the first convolution stage
pub const CONV1_STRIDE: usize = 5;
/// Stride of the second convolution stage
pub const CONV2_STRIDE: usize = 2;
/// Output channels of both convolution stages
pub const CONV_CHANNELS: usize = 20;
/// Width of the shared fully-connected layer
pub const SHARED_HIDDEN_DIM: usize = 100;
/// Smallest frame that leaves one position after both convolutions
pub const MIN_INPUT_SIZE: usize = CONV_KERNEL * CONV1_STRIDE;

fn conv_output_len(input_len: usize, stride: usize) -> Option<usize> {
    input_len
        .checked_sub(CONV_KERNEL)
        .map(|rest| rest / stride + 1)
}

/// Actor-critic network configuration
#[derive(Config, Debug)]
pub struct ActorCriticConfig {
    /// Frame length fed to the network
    pub input_size: usize,
}

impl ActorCriticConfig {
    /// Positions left after both convolution stages
    pub fn trunk_len(&self) -> Option<usize> {
        conv_output_len(self.input_size, CONV1_STRIDE)
            .and_then(|len| conv_output_len(len, CONV2_STRIDE))
    }

    /// Width of the flattened convolution output
    pub fn flattened_dim(&self) -> Option<usize> {
        self.trunk_len().map(|len| len * CONV_CHANNELS)
    }

    pub fn validate(&self) -> A3cResult<()> {
        if self.trunk_len().is_none() {
            return Err(A3cError::InvalidTopology(format!(
                "input size {} is below the minimum of {}",
                self.input_size, MIN_INPUT_SIZE
            )));
        }
        Ok(())
    }

    /// Initialize a fresh network with random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> A3cResult<ActorCriticNetwork<B>> {
        self.validate()?;
        let flattened = self.flattened_dim().unwrap_or_default();

        let conv1 = Conv1dConfig::new(1, CONV_CHANNELS, CONV_KERNEL)
            .with_stride(CONV1_STRIDE)
            .init(device);
        let conv2 = Conv1dConfig::new(CONV_CHANNELS, CONV_CHANNELS, CONV_KERNEL)
            .with_stride(CONV2_STRIDE)
            .init(device);
        let shared = LinearConfig::new(flattened, SHARED_HIDDEN_DIM).init(device);
        let action_head = LinearConfig::new(SHARED_HIDDEN_DIM, NUM_ACTIONS).init(device);
        let value_head = LinearConfig::new(SHARED_HIDDEN_DIM, 1).init(device);

        Ok(ActorCriticNetwork {
            conv1,
            conv2,
            shared,
            action_head,
            value_head,
            activation: Relu::new(),
            input_size: Ignored(self.input_size),
        })
    }
}

/// Shared-trunk actor-critic network
#[derive(Module, Debug)]
pub struct ActorCriticNetwork<B: Backend> {
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    shared: Linear<B>,
    action_head: Linear<B>,
    value_head: Linear<B>,
    activation: Relu,
    input_size: Ignored<usize>,
}

enum NamedParam<'a, B: Backend> {
    Rank1(&'a Param<Tensor<B, 1>>),
    Rank2(&'a Param<Tensor<B, 2>>),
    Rank3(&'a Param<Tensor<B, 3>>),
}

impl<'a, B: Backend> NamedParam<'a, B> {
    fn shape(&self) -> Vec<usize> {
        match self {
            NamedParam::Rank1(p) => p.val().dims().to_vec(),
            NamedParam::Rank2(p) => p.val().dims().to_vec(),
            NamedParam::Rank3(p) => p.val().dims().to_vec(),
        }
    }

    fn values(&self) -> A3cResult<Vec<f32>> {
        match self {
            NamedParam::Rank1(p) => tensor_values(p.val()),
            NamedParam::Rank2(p) => tensor_values(p.val()),
            NamedParam::Rank3(p) => tensor_values(p.val()),
        }
    }
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> A3cResult<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| A3cError::Tensor(format!("{e:?}")))
}

/// `p - lr * g` as a fresh trainable leaf
fn sgd_step<B: Backend, const D: usize>(
    param: Param<Tensor<B, D>>,
    gradient: Option<&GradientTensor>,
    learning_rate: f64,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    match gradient {
        None => param,
        Some(gradient) => param.map(|value| {
            let delta = gradient.to_tensor::<B, D>(device).mul_scalar(learning_rate);
            (value - delta).detach().require_grad()
        }),
    }
}

fn step_conv<B: Backend>(
    layer: &mut Conv1d<B>,
    prefix: &str,
    gradients: &GradientMap,
    learning_rate: f64,
    device: &B::Device,
) {
    layer.weight = sgd_step(
        layer.weight.clone(),
        gradients.get(&format!("{prefix}.weight")),
        learning_rate,
        device,
    );
    if let Some(bias) = layer.bias.take() {
        layer.bias = Some(sgd_step(
            bias,
            gradients.get(&format!("{prefix}.bias")),
            learning_rate,
            device,
        ));
    }
}

fn step_linear<B: Backend>(
    layer: &mut Linear<B>,
    prefix: &str,
    gradients: &GradientMap,
    learning_rate: f64,
    device: &B::Device,
) {
    layer.weight = sgd_step(
        layer.weight.clone(),
        gradients.get(&format!("{prefix}.weight")),
        learning_rate,
        device,
    );
    if let Some(bias) = layer.bias.take() {
        layer.bias = Some(sgd_step(
            bias,
            gradients.get(&format!("{prefix}.bias")),
            learning_rate,
            device,
        ));
    }
}

impl<B: Backend> ActorCriticNetwork<B> {
    /// Frame length this network accepts
    pub fn input_size(&self) -> usize {
        self.input_size.0
    }

    pub fn device(&self) -> B::Device {
        self.shared.weight.val().device()
    }

    /// Forward pass over a batch of frames `[batch, input_size]`.
    ///
    /// Returns `(probabilities [batch, 4], value [batch, 1])`.
    pub fn forward(&self, frames: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, len] = frames.dims();
        let x = frames.reshape([batch, 1, len]);

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = x.flatten::<2>(1, 2);

        let hidden = self.activation.forward(self.shared.forward(x));
        let probabilities = softmax(self.action_head.forward(hidden.clone()), 1);
        let value = self.value_head.forward(hidden);

        (probabilities, value)
    }

    fn input_tensor(&self, frame: &Frame) -> A3cResult<Tensor<B, 2>> {
        if frame.len() != self.input_size() {
            return Err(A3cError::FrameSize {
                expected: self.input_size(),
                actual: frame.len(),
            });
        }
        Ok(Tensor::from_data(
            TensorData::new(frame.to_f32(), [1, frame.len()]),
            &self.device(),
        ))
    }

    /// Action probabilities and value estimate for one frame.
    ///
    /// Pure with respect to the parameters: same parameters and frame give
    /// bit-identical output.
    pub fn infer(&self, frame: &Frame) -> A3cResult<(Vec<f32>, f32)> {
        let (probabilities, value) = self.forward(self.input_tensor(frame)?);
        let probabilities = tensor_values(probabilities)?;
        let value = tensor_values(value)?
            .first()
            .copied()
            .ok_or_else(|| A3cError::Tensor("value head returned no output".into()))?;
        Ok((probabilities, value))
    }

    fn named_params(&self) -> Vec<(String, NamedParam<'_, B>)> {
        let mut params = Vec::with_capacity(10);
        for (prefix, conv) in [("conv1", &self.conv1), ("conv2", &self.conv2)] {
            params.push((format!("{prefix}.weight"), NamedParam::Rank3(&conv.weight)));
            if let Some(bias) = &conv.bias {
                params.push((format!("{prefix}.bias"), NamedParam::Rank1(bias)));
            }
        }
        for (prefix, linear) in [
            ("shared", &self.shared),
            ("action_head", &self.action_head),
            ("value_head", &self.value_head),
        ] {
            params.push((format!("{prefix}.weight"), NamedParam::Rank2(&linear.weight)));
            if let Some(bias) = &linear.bias {
                params.push((format!("{prefix}.bias"), NamedParam::Rank1(bias)));
            }
        }
        params
    }

    /// Shape of every trainable parameter, by name
    pub fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        self.named_params()
            .into_iter()
            .map(|(name, param)| (name, param.shape()))
            .collect()
    }

    /// Current value of every trainable parameter, by name
    pub fn parameter_values(&self) -> A3cResult<BTreeMap<String, Vec<f32>>> {
        self.named_params()
            .into_iter()
            .map(|(name, param)| param.values().map(|values| (name, values)))
            .collect()
    }

    /// Plain SGD update `p <- p - learning_rate * g` for every parameter named
    /// in `gradients`.
    ///
    /// The whole map is validated first; an unknown name or a shape mismatch is
    /// a programming error and leaves the network untouched.
    pub fn apply_gradient(&mut self, gradients: &GradientMap, learning_rate: f64) -> A3cResult<()> {
        let shapes = self.parameter_shapes();
        for (name, gradient) in gradients.iter() {
            let expected = shapes
                .get(name)
                .ok_or_else(|| A3cError::UnknownParameter(name.clone()))?;
            if gradient.shape() != expected.as_slice() {
                return Err(A3cError::ShapeMismatch {
                    parameter: name.clone(),
                    expected: expected.clone(),
                    actual: gradient.shape().to_vec(),
                });
            }
        }

        let device = self.device();
        step_conv(&mut self.conv1, "conv1", gradients, learning_rate, &device);
        step_conv(&mut self.conv2, "conv2", gradients, learning_rate, &device);
        step_linear(&mut self.shared, "shared", gradients, learning_rate, &device);
        step_linear(&mut self.action_head, "action_head", gradients, learning_rate, &device);
        step_linear(&mut self.value_head, "value_head", gradients, learning_rate, &device);
        Ok(())
    }
}

fn gradient_entry<B: AutodiffBackend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    grads: &B::Gradients,
) -> A3cResult<GradientTensor> {
    let value = param.val();
    let shape = value.dims().to_vec();
    match value.grad(grads) {
        Some(grad) => GradientTensor::new(shape, tensor_values(grad)?),
        None => Ok(GradientTensor::zeros(shape)),
    }
}

impl<B: AutodiffBackend> ActorCriticNetwork<B> {
    /// Gradients of all parameters for one forward/backward pass on `frame`,
    /// driven by explicit error signals at the two head outputs.
    ///
    /// The backward pass runs on the surrogate
    /// `sum(probabilities * action_error) + sum(value * value_error)`, whose
    /// gradient at each head output is exactly the given error. Parameters are
    /// not modified.
    pub fn backpropagate(
        &self,
        frame: &Frame,
        action_error: &[f32],
        value_error: &[f32],
    ) -> A3cResult<GradientMap> {
        if action_error.len() != NUM_ACTIONS {
            return Err(A3cError::ErrorSignal {
                head: "action",
                expected: NUM_ACTIONS,
                actual: action_error.len(),
            });
        }
        if value_error.len() != 1 {
            return Err(A3cError::ErrorSignal {
                head: "value",
                expected: 1,
                actual: value_error.len(),
            });
        }

        let device = self.device();
        let (probabilities, value) = self.forward(self.input_tensor(frame)?);

        let action_error: Tensor<B, 2> = Tensor::from_data(
            TensorData::new(action_error.to_vec(), [1, NUM_ACTIONS]),
            &device,
        );
        let value_error: Tensor<B, 2> =
            Tensor::from_data(TensorData::new(value_error.to_vec(), [1, 1]), &device);

        let surrogate = (probabilities * action_error).sum() + (value * value_error).sum();
        let grads = surrogate.backward();

        let mut gradients = GradientMap::new();
        for (name, param) in self.named_params() {
            let entry = match param {
                NamedParam::Rank1(p) => gradient_entry(p, &grads)?,
                NamedParam::Rank2(p) => gradient_entry(p, &grads)?,
                NamedParam::Rank3(p) => gradient_entry(p, &grads)?,
            };
            gradients.insert(name, entry);
        }
        Ok(gradients)
    }
}
