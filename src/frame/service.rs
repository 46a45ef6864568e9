//! Store-backed frame construction.

use chrono::Utc;
use tracing::debug;

use super::builder::{build_frame, Frame};
use super::ONE_HOUR_MS;
use crate::adapters::PriceStore;
use crate::domain::Timestamp;
use crate::error::Result;

/// Fetches a price window and turns it into a frame
pub struct FrameService<S> {
    store: S,
    frame_size: usize,
}

impl<S: PriceStore> FrameService<S> {
    /// `frame_size` is the bin count of [`Self::lookback_frame`]
    pub fn new(store: S, frame_size: usize) -> Self {
        Self { store, frame_size }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Frame of `bin_count` bins over `[window_start, window_end)`.
    ///
    /// The whole window is materialised before binning; a store failure or an
    /// empty bin aborts without a partial frame.
    pub async fn frame(
        &self,
        instrument: &str,
        bin_count: usize,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Frame> {
        let points = self
            .store
            .price_points(instrument, window_start, window_end)
            .await?;
        debug!(
            instrument,
            points = points.len(),
            bin_count,
            "building frame for [{}, {})",
            window_start,
            window_end
        );
        build_frame(&points, bin_count, window_start, window_end)
    }

    /// One-hour lookback frame ending at `window_end`
    pub async fn lookback_frame(&self, instrument: &str, window_end: Timestamp) -> Result<Frame> {
        self.frame(
            instrument,
            self.frame_size,
            window_end - ONE_HOUR_MS,
            window_end,
        )
        .await
    }

    /// One-hour lookback frame ending now
    pub async fn latest_frame(&self, instrument: &str) -> Result<Frame> {
        self.lookback_frame(instrument, Utc::now().timestamp_millis())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryMarketStore;
    use crate::domain::PricePoint;
    use crate::error::A3cError;

    #[tokio::test]
    async fn test_lookback_frame_uses_the_hour_before_end() {
        let end = 10 * ONE_HOUR_MS;
        let start = end - ONE_HOUR_MS;
        let step = ONE_HOUR_MS / 4;
        let mut prices: Vec<PricePoint> = (1..=4)
            .map(|i| PricePoint::new(start + i * step, "ETH-USD", i as f64))
            .collect();
        // outside the window or another instrument
        prices.push(PricePoint::new(start - 1, "ETH-USD", 99.0));
        prices.push(PricePoint::new(start + step, "BTC-USD", 99.0));

        let service = FrameService::new(InMemoryMarketStore::with_prices(prices), 4);
        let frame = service.lookback_frame("ETH-USD", end).await.unwrap();

        assert_eq!(frame.values(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_sparse_window_fails_with_empty_bin() {
        let end = ONE_HOUR_MS * 2;
        let prices = vec![PricePoint::new(end, "ETH-USD", 1.0)];

        let service = FrameService::new(InMemoryMarketStore::with_prices(prices), 60);
        let result = service.lookback_frame("ETH-USD", end).await;

        assert!(matches!(result, Err(A3cError::EmptyBin { bin: 0, .. })));
    }
}
