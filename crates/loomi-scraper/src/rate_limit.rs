//! Per-host adaptive request pacing shared by every worker in a run.
//!
//! Each host starts at the minimum delay. A 429 from any worker doubles the
//! host's delay (up to the ceiling) and every later request to that host waits
//! at least that long. A host at zero delay jumps to a small fixed delay
//! instead. The delay is never lowered during a run.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fraction of the current delay added as random jitter.
const JITTER_FRACTION: f64 = 0.3;

/// Delay after the first 429 when a host starts with no delay at all.
const FIRST_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    delays: Mutex<HashMap<String, Duration>>,
}

impl AdaptiveRateLimiter {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            delays: Mutex::new(HashMap::new()),
        }
    }

    /// Current delay for `host`; the minimum if the host has never been throttled.
    #[must_use]
    pub fn current_delay(&self, host: &str) -> Duration {
        let delays = self
            .delays
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        delays.get(host).copied().unwrap_or(self.min_delay)
    }

    /// Records a 429 from `host` and returns the new, larger delay.
    ///
    /// The read-modify-write happens under one lock so concurrent 429s are
    /// never lost.
    pub fn record_rate_limit(&self, host: &str) -> Duration {
        let mut delays = self
            .delays
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let current = delays.get(host).copied().unwrap_or(self.min_delay);
        let grown = if current.is_zero() {
            FIRST_BACKOFF
        } else {
            current.saturating_mul(2)
        };
        let next = grown.min(self.max_delay);
        delays.insert(host.to_string(), next);
        drop(delays);

        tracing::warn!(
            host,
            delay_ms = u64::try_from(next.as_millis()).unwrap_or(u64::MAX),
            "rate limited, slowing down requests to host"
        );
        next
    }

    /// Sleeps for the host's current delay plus up to 30% jitter.
    pub async fn wait(&self, host: &str) {
        let base = self.current_delay(host);
        if base.is_zero() {
            return;
        }
        let jitter = base.mul_f64(rand::random::<f64>() * JITTER_FRACTION);
        tokio::time::sleep(base + jitter).await;
    }
}
