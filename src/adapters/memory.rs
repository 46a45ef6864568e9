use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{PredictionLog, PriceStore};
use crate::domain::{PredictionRecord, PricePoint, Timestamp};
use crate::error::Result;

/// Process-local store, used for replay and tests
#[derive(Debug, Default)]
pub struct InMemoryMarketStore {
    prices: RwLock<Vec<PricePoint>>,
    predictions: RwLock<Vec<PredictionRecord>>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(prices: Vec<PricePoint>) -> Self {
        Self {
            prices: RwLock::new(prices),
            predictions: RwLock::new(Vec::new()),
        }
    }

    pub async fn push_price(&self, point: PricePoint) {
        self.prices.write().await.push(point);
    }
}

#[async_trait]
impl PriceStore for InMemoryMarketStore {
    async fn price_points(
        &self,
        instrument: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PricePoint>> {
        let prices = self.prices.read().await;
        Ok(prices
            .iter()
            .filter(|p| p.instrument == instrument && p.timestamp >= from && p.timestamp <= to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PredictionLog for InMemoryMarketStore {
    async fn record(&self, prediction: &PredictionRecord) -> Result<()> {
        self.predictions.write().await.push(prediction.clone());
        Ok(())
    }

    async fn predictions(
        &self,
        model_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PredictionRecord>> {
        let predictions = self.predictions.read().await;
        let mut selected: Vec<_> = predictions
            .iter()
            .filter(|p| p.model_id == model_id && p.timestamp >= from && p.timestamp <= to)
            .cloned()
            .collect();
        selected.sort_by_key(|p| p.timestamp);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_price_query_filters_instrument_and_range() {
        let store = InMemoryMarketStore::with_prices(vec![
            PricePoint::new(10, "ETH-USD", 1.0),
            PricePoint::new(20, "BTC-USD", 2.0),
            PricePoint::new(30, "BTC-USD", 3.0),
            PricePoint::new(40, "BTC-USD", 4.0),
        ]);

        let points = store.price_points("BTC-USD", 20, 30).await.unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_prediction_log_is_sorted_per_model() {
        let store = InMemoryMarketStore::new();
        for (model, ts) in [("m1", 30), ("m2", 10), ("m1", 10)] {
            store
                .record(&PredictionRecord {
                    model_id: model.to_string(),
                    timestamp: ts,
                    action_probabilities: vec![0.25; 4],
                    value_prediction: 0.0,
                })
                .await
                .unwrap();
        }

        let records = store.predictions("m1", 0, 100).await.unwrap();
        let stamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![10, 30]);
    }
}
