use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Epoch milliseconds
pub type Timestamp = i64;

/// One raw price tick as supplied by the store.
///
/// Arrival order is not timestamp order; consumers must not assume sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    pub instrument: String,
    pub value: f64,
}

impl PricePoint {
    pub fn new(timestamp: Timestamp, instrument: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            instrument: instrument.into(),
            value,
        }
    }

    /// Timestamp as a UTC datetime, `None` when out of chrono's range
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// A logged model output, used for auditing and replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub model_id: String,
    pub timestamp: Timestamp,
    pub action_probabilities: Vec<f32>,
    pub value_prediction: f32,
}
