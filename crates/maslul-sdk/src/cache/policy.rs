//! Per-key-class caching policy
//!
//! Freshness and retry behavior are explicit policy objects handed to
//! each cache instance, not ambient framework behavior, so they can be
//! exercised in isolation from any rendering layer.

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3)
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt
    /// (default: 500 ms)
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff delay after a failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op`, retrying transient failures with exponential backoff.
    ///
    /// A terminal failure (4xx, malformed payload) is returned on the
    /// spot; transient failures are retried until the attempt budget is
    /// spent, then surfaced.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Caching policy for one class of keys
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// How long a cached entry is served without revalidation
    pub freshness_window: Duration,
    /// Retry behavior for fetches under this policy
    pub retry: RetryPolicy,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::roadmap_content()
    }
}

impl CachePolicy {
    /// Policy for roadmap content: 5 minute freshness window
    pub fn roadmap_content() -> Self {
        Self {
            freshness_window: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }

    /// Read-through policy: no freshness window, every read past the
    /// first serves stale and revalidates
    pub fn read_through() -> Self {
        Self {
            freshness_window: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the freshness window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Window shorthand: 1 minute
    pub fn window_1m(self) -> Self {
        self.with_window(Duration::from_secs(60))
    }

    /// Window shorthand: 5 minutes
    pub fn window_5m(self) -> Self {
        self.with_window(Duration::from_secs(300))
    }

    /// Window shorthand: 15 minutes
    pub fn window_15m(self) -> Self {
        self.with_window(Duration::from_secs(900))
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
