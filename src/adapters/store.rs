use async_trait::async_trait;

use crate::domain::{PredictionRecord, PricePoint, Timestamp};
use crate::error::Result;

/// Source of raw price ticks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// All ticks of `instrument` with `from <= timestamp <= to`, in arrival
    /// order (not necessarily sorted).
    async fn price_points(
        &self,
        instrument: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PricePoint>>;
}

/// Audit log of model outputs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionLog: Send + Sync {
    async fn record(&self, prediction: &PredictionRecord) -> Result<()>;

    /// Records of `model_id` with `from <= timestamp <= to`, oldest first
    async fn predictions(
        &self,
        model_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PredictionRecord>>;
}
