//! Minimum spacing between outbound backend calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;

/// Process-wide throttle: one instance is shared by every request.
///
/// The last-call timestamp stays locked while a caller waits, so concurrent
/// callers queue up behind each other instead of reading a stale value.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
            clock,
        }
    }

    /// Wait until a call may be dispatched and record it. Returns the time waited.
    pub async fn acquire(&self) -> Duration {
        let mut last_call = self.last_call.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last_call {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                debug!(wait_ms = waited.as_millis() as u64, "Rate limiting backend call");
                self.clock.sleep(waited).await;
            }
        }

        *last_call = Some(self.clock.now());
        waited
    }
}
