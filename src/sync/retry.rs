//! Timeout and bounded retry for external calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;

use super::client::ExternalApiError;

/// Runs `call` with a per-attempt timeout, retrying transient failures with
/// exponential backoff.
///
/// A timed-out attempt counts as [`ExternalApiError::Timeout`]. Rate-limit
/// answers that carry a suggested wait use it instead of the computed
/// backoff, capped at `max_backoff_ms`. Returns the last error once `max_retries` retries are spent.
pub async fn call_with_retry<T, F, Fut>(
    retry: &RetryConfig,
    timeout: Duration,
    operation: &str,
    mut call: F,
) -> Result<T, ExternalApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExternalApiError>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        debug!(operation, attempt, "Calling scheduling API");

        let result = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ExternalApiError::Timeout {
                elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_transient() || attempt > retry.max_retries {
            warn!(operation, attempt, error = %error, "Scheduling API call failed");
            return Err(error);
        }

        let wait = match &error {
            ExternalApiError::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis((*ms).min(retry.max_backoff_ms)),
            _ => retry.calculate_backoff(attempt),
        };
        warn!(
            operation,
            attempt,
            error = %error,
            wait_ms = wait.as_millis(),
            "Transient error, retrying with backoff"
        );
        tokio::time::sleep(wait).await;
    }
}
