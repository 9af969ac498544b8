//! Exponential backoff shared by publish retries and redelivery delays.

use std::future::Future;
use std::time::Duration;

use crate::error::BusError;

/// Cap on the doubling exponent so the delay never overflows.
const MAX_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Set to 0 to disable retries.
    pub max_retries: u32,
    /// Exponential backoff: delay * 2^retry_number.
    pub initial_retry_delay: Duration,
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            initial_retry_delay: Duration::from_millis(50),
        }
    }

    /// Three retries starting at one second.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(1),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(MAX_EXPONENT);
        self.initial_retry_delay * (1u32 << exp)
    }

    /// True while another attempt is allowed after `attempt` attempts.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Run `operation` until it succeeds or retries are exhausted.
    pub async fn execute<F, Fut>(&self, mut operation: F, topic: &str) -> Result<(), BusError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), BusError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(topic, attempt, "Publish succeeded after retries");
                    }
                    return Ok(());
                }
                Err(e) if self.allows_retry_after(attempt) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        error = %e,
                        topic,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, topic, attempt, "Publish failed after all retry attempts");
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retries()
    }
}
