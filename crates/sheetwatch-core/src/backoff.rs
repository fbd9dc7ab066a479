//! Exponential backoff for data-source calls that hit rate limits.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::time::sleep;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct BackoffConfig {
    /// Total attempts, the first one included.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Runs remote calls, retrying rate-limited ones with exponential delay.
///
/// Also counts every attempt made through it; the count is only reported.
#[derive(Debug, Default)]
pub struct Backoff {
    cfg: BackoffConfig,
    api_calls: AtomicU64,
}

impl Backoff {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self {
            cfg,
            api_calls: AtomicU64::new(0),
        }
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Delay after the `attempt`-th (zero-based) rate-limited attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.cfg
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    pub async fn execute<T, F, Fut>(&self, call: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..self.cfg.max_retries {
            let count = self.api_calls.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(call, api_calls = count, "API request");

            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_rate_limited() => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        call,
                        attempt = attempt + 1,
                        max_retries = self.cfg.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        "Rate limit exceeded, backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::RetriesExhausted {
            call: call.to_string(),
            retries: self.cfg.max_retries,
        })
    }
}
