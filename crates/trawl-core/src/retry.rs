//! Bounded retry with exponential backoff for backend clients
//!
//! Policy layer for collaborator clients only: the pager and the batch
//! generator never retry.

use std::time::Duration;

use crate::error::BackendError;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry a fallible backend call with exponential backoff.
///
/// Retries only errors the client marked retryable
/// ([`BackendError::is_retryable`]), at most `max_retries` times, in a
/// plain bounded loop.
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion or
/// a non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    max_retries: u32,
    mut attempt_fn: impl FnMut() -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(attempt));
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return Err(e);
            }
        }
    }
}
