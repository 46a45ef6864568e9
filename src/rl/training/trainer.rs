//! Training Loop
//!
//! Turns a batch of completed trades into one accumulated gradient, applies
//! it to a copy of the live network, persists the copy and only then
//! publishes it.

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::returns::target_returns;
use crate::config::A3cConfig;
use crate::error::{A3cError, Result};
use crate::rl::core::Trade;
use crate::rl::gradients::GradientMap;
use crate::rl::lifecycle::ModelLifecycle;
use crate::rl::model::ModelHandle;
use crate::rl::networks::ActorCriticNetwork;
use crate::rl::training::checkpointing::ModelStore;

/// Floor applied before taking the log of an action probability
const MIN_PROBABILITY: f32 = 1e-8;

/// Trainer hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Discount factor, in (0, 1)
    pub gamma: f64,
    /// SGD step size
    pub learning_rate: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            learning_rate: 1e-3,
        }
    }
}

impl From<&A3cConfig> for TrainerConfig {
    fn from(config: &A3cConfig) -> Self {
        Self {
            gamma: config.gamma,
            learning_rate: config.learning_rate,
        }
    }
}

/// Gradient and bookkeeping for one trajectory
#[derive(Debug, Clone)]
pub struct TrajectoryGradient {
    pub gradients: GradientMap,
    pub steps: usize,
    pub squared_advantage: f64,
}

/// Summed gradient for a batch of trajectories
#[derive(Debug, Clone, Default)]
pub struct BatchGradient {
    pub gradients: GradientMap,
    pub trades_used: usize,
    pub trades_skipped: usize,
    pub steps: usize,
    pub squared_advantage: f64,
}

/// Outcome of one [`Trainer::train`] call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trades_used: usize,
    pub trades_skipped: usize,
    pub steps: usize,
    pub mean_squared_advantage: f64,
    /// Whether a gradient was applied and persisted
    pub applied: bool,
    /// Model version after the call
    pub version: u64,
}

/// Stateless between batches: every call is a function of the trades and the
/// current parameters.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        if !(config.gamma > 0.0 && config.gamma < 1.0) {
            return Err(A3cError::Config(config::ConfigError::Message(format!(
                "gamma must be in (0, 1), got {}",
                config.gamma
            ))));
        }
        if !(config.learning_rate.is_finite() && config.learning_rate > 0.0) {
            return Err(A3cError::Config(config::ConfigError::Message(format!(
                "learning rate must be positive, got {}",
                config.learning_rate
            ))));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Accumulated gradient of one trade, walking its non-terminal steps
    /// latest first. `None` for trades too short to produce a target.
    pub fn trajectory_gradient<B: AutodiffBackend>(
        &self,
        network: &ActorCriticNetwork<B>,
        trade: &Trade,
    ) -> Result<Option<TrajectoryGradient>> {
        let targets = target_returns(trade, self.config.gamma)?;
        if targets.is_empty() {
            return Ok(None);
        }

        let mut gradients = GradientMap::new();
        let mut squared_advantage = 0.0;
        for target in &targets {
            let step = &trade.steps()[target.index];
            let advantage = (target.target - step.value_prediction as f64) as f32;

            let action_error: Vec<f32> = step
                .action_probabilities
                .iter()
                .map(|p| p.max(MIN_PROBABILITY).ln() * advantage)
                .collect();
            let value_error = [advantage * advantage];

            let step_gradients =
                network.backpropagate(&step.observation, &action_error, &value_error)?;
            gradients.accumulate(step_gradients)?;
            squared_advantage += (advantage * advantage) as f64;
        }

        Ok(Some(TrajectoryGradient {
            gradients,
            steps: targets.len(),
            squared_advantage,
        }))
    }

    /// Sum of the trajectory gradients of every usable trade
    pub fn batch_gradient<B: AutodiffBackend>(
        &self,
        network: &ActorCriticNetwork<B>,
        trades: &[Trade],
    ) -> Result<BatchGradient> {
        let mut batch = BatchGradient::default();
        for (index, trade) in trades.iter().enumerate() {
            match self.trajectory_gradient(network, trade)? {
                Some(trajectory) => {
                    batch.gradients.accumulate(trajectory.gradients)?;
                    batch.trades_used += 1;
                    batch.steps += trajectory.steps;
                    batch.squared_advantage += trajectory.squared_advantage;
                }
                None => {
                    debug!(trade = index, steps = trade.len(), "Skipping short trade");
                    batch.trades_skipped += 1;
                }
            }
        }
        Ok(batch)
    }

    /// One batch update: gradient, apply, persist, publish.
    ///
    /// Any failure leaves both the live model and its stored snapshot as
    /// they were.
    pub async fn train<B, S>(
        &self,
        handle: &ModelHandle<B>,
        lifecycle: &ModelLifecycle<S>,
        trades: &[Trade],
    ) -> Result<TrainingReport>
    where
        B: AutodiffBackend,
        S: ModelStore,
    {
        let update = handle.begin_update().await;
        let batch = self.batch_gradient(update.base(), trades)?;

        let mean_squared_advantage = if batch.steps > 0 {
            batch.squared_advantage / batch.steps as f64
        } else {
            0.0
        };
        let mut report = TrainingReport {
            trades_used: batch.trades_used,
            trades_skipped: batch.trades_skipped,
            steps: batch.steps,
            mean_squared_advantage,
            applied: false,
            version: handle.version(),
        };

        if batch.gradients.is_empty() {
            warn!(
                model_id = handle.id(),
                trades = trades.len(),
                "No usable trades in batch, model unchanged"
            );
            return Ok(report);
        }

        let mut network = update.working_copy();
        network.apply_gradient(&batch.gradients, self.config.learning_rate)?;
        lifecycle.save(network.clone(), handle.id()).await?;

        report.version = update.commit(network).await;
        report.applied = true;

        info!(
            model_id = handle.id(),
            version = report.version,
            trades = report.trades_used,
            skipped = report.trades_skipped,
            steps = report.steps,
            mean_squared_advantage = report.mean_squared_advantage,
            "Applied training batch"
        );
        Ok(report)
    }
}
