//! Training Infrastructure
//!
//! Return targets, the batch trainer, and snapshot storage.

pub mod checkpointing;
pub mod returns;
pub mod trainer;

pub use checkpointing::{validate_model_id, FileModelStore, ModelStore};
pub use returns::{profit_share, target_returns, StepTarget};
pub use trainer::{
    BatchGradient, Trainer, TrainerConfig, TrainingReport, TrajectoryGradient,
};
