//! Bounded retry around store calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{error, warn};

use super::store::{PredictionLog, PriceStore};
use crate::config::RetryConfig;
use crate::domain::{PredictionRecord, PricePoint, Timestamp};
use crate::error::{A3cError, Result};

/// Exponential backoff with jitter, a hard attempt cap and a time limit on
/// every attempt
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            attempt_timeout: RetryConfig::default().attempt_timeout(),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
            .with_attempt_timeout(config.attempt_timeout())
    }

    /// Limit each attempt to `timeout`; an attempt that runs over counts as a
    /// retryable failure
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        (self.base_delay * factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Exhaustion is reported as
    /// [`A3cError::StoreUnavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(A3cError::Timeout {
                    operation: operation.to_string(),
                    after_ms: self.attempt_timeout.as_millis() as u64,
                }),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    error!("{} failed after {} attempts: {}", operation, attempt, e);
                    return Err(A3cError::StoreUnavailable {
                        operation: operation.to_string(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    let jitter_range = (delay.as_millis() as u64 / 4).max(1);
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..jitter_range));
                    let final_delay = delay + jitter;
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, self.max_attempts, e, final_delay
                    );
                    tokio::time::sleep(final_delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Store wrapper applying a [`RetryPolicy`] to every call
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: PriceStore> PriceStore for RetryingStore<S> {
    async fn price_points(
        &self,
        instrument: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PricePoint>> {
        self.policy
            .run("price_points", move || self.inner.price_points(instrument, from, to))
            .await
    }
}

#[async_trait]
impl<S: PredictionLog> PredictionLog for RetryingStore<S> {
    async fn record(&self, prediction: &PredictionRecord) -> Result<()> {
        self.policy
            .run("record_prediction", move || self.inner.record(prediction))
            .await
    }

    async fn predictions(
        &self,
        model_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PredictionRecord>> {
        self.policy
            .run("predictions", move || self.inner.predictions(model_id, from, to))
            .await
    }
}
