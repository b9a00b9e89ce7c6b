/*!
 * Bounded HTTP retry with exponential backoff and request pacing.
 */

use log::warn;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::ProviderError;

/// Retry and rate-limit policy shared by the HTTP clients
#[derive(Debug)]
pub struct RequestPolicy {
    /// Maximum number of retry attempts after the first request
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Minimum spacing between requests, from the per-minute limit
    min_interval: Option<Duration>,
    /// Earliest moment the next request may go out
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPolicy {
    /// Create a policy; `rate_limit` is in requests per minute
    pub fn new(max_retries: u32, backoff_base_ms: u64, rate_limit: Option<u32>) -> Self {
        let min_interval = rate_limit
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_millis(60_000 / rpm as u64));

        Self {
            max_retries,
            backoff_base_ms,
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    async fn wait_for_slot(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let wait_until = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + interval);
            slot
        };

        tokio::time::sleep_until(wait_until).await;
    }

    /// Run `attempt` until it succeeds, fails permanently, or retries run out
    pub async fn run<T, F, Fut>(&self, provider: &str, mut attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;

        loop {
            self.wait_for_slot().await;

            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let backoff = self.backoff(retry);
                    warn!(
                        "{} request failed: {} - attempt {}/{}, retrying in {:?}",
                        provider,
                        e,
                        retry,
                        self.max_attempts(),
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
