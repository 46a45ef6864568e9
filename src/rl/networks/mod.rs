//! Neural Network Architectures
//!
//! The shared-trunk actor-critic network used for inference and training.

pub mod actor_critic;

pub use actor_critic::{
    ActorCriticConfig, ActorCriticNetwork, CONV1_STRIDE, CONV2_STRIDE, CONV_CHANNELS, CONV_KERNEL,
    MIN_INPUT_SIZE, SHARED_HIDDEN_DIM,
};
