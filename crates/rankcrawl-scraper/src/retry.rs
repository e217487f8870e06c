//! Bounded retry with exponential backoff for transient fetch failures.
//!
//! Disabled unless `max_retries > 0`: a failed fetch is terminal for the run
//! by default. Non-transient errors (4xx other than 429, malformed pages,
//! invalid URLs) are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` if `err` is worth retrying after a backoff delay.
///
/// Retriable:
/// - [`ScraperError::RateLimited`] (HTTP 429).
/// - [`ScraperError::UnexpectedStatus`] with a 5xx status.
/// - [`ScraperError::Http`] timeouts and connection failures.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } => true,
        ScraperError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        ScraperError::Http(e) => e.is_timeout() || e.is_connect(),
        ScraperError::InvalidUrl { .. } | ScraperError::MalformedPage { .. } => false,
    }
}

/// Sleep before retry number `retry` (1-based) following `err`.
///
/// The base delay doubles per retry from `backoff_base_ms` and is jittered by
/// ±25 %. A 429 with `Retry-After` waits at least that long. Never exceeds
/// [`MAX_DELAY_MS`].
fn backoff_delay(retry: u32, backoff_base_ms: u64, err: &ScraperError) -> Duration {
    let exponential = backoff_base_ms
        .saturating_mul(1u64 << retry.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS);
    let server_floor = match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => retry_after_secs.saturating_mul(1_000),
        _ => 0,
    };
    Duration::from_millis(jitter(exponential).max(server_floor).min(MAX_DELAY_MS))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn jitter(ms: u64) -> u64 {
    (ms as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64
}

/// Runs `operation`, retrying up to `max_retries` more times on transient
/// errors with the delay from [`backoff_delay`].
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retries == max_retries || !is_retriable(&err) {
            return Err(err);
        }
        retries += 1;
        let delay = backoff_delay(retries, backoff_base_ms, &err);
        tracing::warn!(
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "fetch failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
