//! Reinforcement Learning Module
//!
//! Actor-critic model core built on the Burn framework.
//!
//! # Features
//!
//! - **Network**: shared convolutional trunk with action and value heads
//! - **Inference**: [`Predictor`] over a live [`ModelHandle`]
//! - **Training**: trajectory returns folded into one gradient per batch
//! - **Lifecycle**: load-or-create and atomic snapshots keyed by model id

pub mod core;
pub mod gradients;
pub mod lifecycle;
pub mod model;
pub mod networks;
pub mod predictor;
pub mod training;

use burn::backend::Autodiff;
use burn_ndarray::NdArray;

/// CPU backend for inference-only use
pub type InferenceBackend = NdArray<f32>;
/// CPU backend with autodiff, required by [`Trainer`]
pub type TrainingBackend = Autodiff<NdArray<f32>>;

// Core exports
pub use core::{Trade, TradeAction, TradeStep, NUM_ACTIONS};

// Network exports
pub use gradients::{GradientMap, GradientTensor};
pub use networks::{ActorCriticConfig, ActorCriticNetwork, MIN_INPUT_SIZE};

// Model exports
pub use lifecycle::ModelLifecycle;
pub use model::{ModelHandle, ModelUpdate};
pub use predictor::{Prediction, Predictor};

// Training exports
pub use training::{
    target_returns, FileModelStore, ModelStore, StepTarget, Trainer, TrainerConfig,
    TrainingReport,
};
