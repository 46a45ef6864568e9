//! Predictor
//!
//! Frame in, named model outputs out.

use std::sync::Arc;

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::PredictionLog;
use crate::domain::{PredictionRecord, Timestamp};
use crate::error::{A3cError, Result};
use crate::frame::Frame;
use crate::rl::core::TradeAction;
use crate::rl::model::ModelHandle;

/// Model output with the names downstream consumers rely on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Action probabilities, indexed by [`TradeAction`]
    pub probabilities: Vec<f32>,
    /// Single-element value estimate
    #[serde(rename = "valueFun")]
    pub value_fun: Vec<f32>,
}

impl Prediction {
    pub fn new(probabilities: Vec<f32>, value: f32) -> Self {
        Self {
            probabilities,
            value_fun: vec![value],
        }
    }

    pub fn value(&self) -> f32 {
        self.value_fun.first().copied().unwrap_or_default()
    }

    /// Arg-max action
    pub fn best_action(&self) -> Option<TradeAction> {
        TradeAction::most_probable(&self.probabilities)
    }

    pub fn to_record(&self, model_id: impl Into<String>, timestamp: Timestamp) -> PredictionRecord {
        PredictionRecord {
            model_id: model_id.into(),
            timestamp,
            action_probabilities: self.probabilities.clone(),
            value_prediction: self.value(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| A3cError::Other(e.into()))
    }
}

/// Thin inference front for a live model
pub struct Predictor<B: Backend> {
    handle: Arc<ModelHandle<B>>,
}

impl<B: Backend> Clone for Predictor<B> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<B: Backend> Predictor<B> {
    pub fn new(handle: Arc<ModelHandle<B>>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Arc<ModelHandle<B>> {
        &self.handle
    }

    pub async fn predict(&self, frame: &Frame) -> Result<Prediction> {
        let (probabilities, value) = self.handle.infer(frame).await?;
        debug!(
            model_id = self.handle.id(),
            version = self.handle.version(),
            ?probabilities,
            value,
            "prediction"
        );
        Ok(Prediction::new(probabilities, value))
    }

    /// Predict and append the result to the prediction log
    pub async fn predict_and_log<L>(
        &self,
        log: &L,
        timestamp: Timestamp,
        frame: &Frame,
    ) -> Result<Prediction>
    where
        L: PredictionLog + ?Sized,
    {
        let prediction = self.predict(frame).await?;
        log.record(&prediction.to_record(self.handle.id(), timestamp))
            .await?;
        Ok(prediction)
    }
}
