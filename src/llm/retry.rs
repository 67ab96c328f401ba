//! Retry policy shared by the blocking and async call paths

use crate::llm::ServiceError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff over transient service failures
///
/// `max_retries = 0` means a single attempt. The k-th retry waits
/// `backoff_factor * 2^(k-1)` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Base delay in seconds
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
        }
    }

    /// Delay before the given 1-indexed retry
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let seconds = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Decide what to do after the `retry`-th failure (1-indexed)
    ///
    /// Returns the delay to wait before the next attempt, or `None` when the
    /// failure must be surfaced: either it is permanent or retries are spent.
    pub fn next_delay(&self, error: &ServiceError, retry: u32) -> Option<Duration> {
        if !error.is_transient() || retry > self.max_retries {
            return None;
        }
        Some(self.delay(retry))
    }

    /// Run `operation` on the calling thread, sleeping between attempts
    pub fn run_blocking<T, F>(&self, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Result<T, ServiceError>,
    {
        let mut retry = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    retry += 1;
                    let Some(delay) = self.next_delay(&error, retry) else {
                        return Err(error);
                    };
                    self.log_retry(&error, retry, delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    /// Run `operation`, yielding to the scheduler between attempts
    pub async fn run_async<T, F, Fut>(&self, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    retry += 1;
                    let Some(delay) = self.next_delay(&error, retry) else {
                        return Err(error);
                    };
                    self.log_retry(&error, retry, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn log_retry(&self, error: &ServiceError, retry: u32, delay: Duration) {
        warn!(
            "Retrying chat request after error (attempt {}/{}, waiting {:.2}s): {}",
            retry,
            self.max_retries,
            delay.as_secs_f64(),
            error
        );
    }
}
