//! Bounded retry with exponential backoff for calls to hosted services.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Classifies an error as worth retrying.
pub trait Transient {
    /// True for timeouts, connection failures, rate limiting and 5xx responses.
    fn is_transient(&self) -> bool;
}

/// How many times to try a call, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// The error of the final attempt, and how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, Exhausted<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(operation, attempt, ?delay, error = %error, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(Exhausted {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}
