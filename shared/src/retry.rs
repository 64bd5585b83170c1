//! Bounded retry with exponential backoff for backend calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::{Error, Result};

/// When and how often a failed call is repeated.
///
/// Only errors for which [`Error::is_transient`] holds are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Growth factor applied per further attempt
    pub multiplier: u32,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            multiplier: 2,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff after the given 1-based attempt failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, clock: &dyn Clock, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Backend call failed, retrying"
                    );
                    clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(Error::BackendTransient(cause)) => {
                    return Err(Error::BackendTransient(format!(
                        "{} (gave up after {} attempts)",
                        cause, attempt
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
