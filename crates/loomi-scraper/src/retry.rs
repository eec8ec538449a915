//! Exponential backoff for page fetches.
//!
//! Transient failures and timeouts are retried; permanent failures and engine
//! launch errors are returned on the first attempt so the manager can fall
//! through to the next strategy.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Executes `operation`, retrying retryable [`FetchError`]s with exponential backoff.
///
/// The wait before retry `n` (1-based) is `backoff_base_ms * 2^(n-1)` milliseconds.
/// With `max_retries = 3` the operation is attempted at most 4 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }

        let delay_ms = backoff_base_ms.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt = attempt + 1,
            max_retries,
            delay_ms,
            error = %err,
            "retryable fetch error, backing off"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}
