//! Backoff helpers shared by provider clients and the retry policy.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::ModelError;

/// Cap applied to every computed delay.
const MAX_DELAY_MS: u64 = 60_000;

/// Parse a `Retry-After` header value in seconds, capped at one minute.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}

/// Exponential backoff delay for a given zero-based attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(factor);
    Duration::from_millis(delay_ms.min(MAX_DELAY_MS))
}

/// Sleep for the configured per-request delay, if any.
pub(super) async fn apply_request_delay(delay_ms: u64, provider: &str) {
    if delay_ms > 0 {
        let delay = Duration::from_millis(delay_ms);
        debug!("{}: waiting {:?} before request", provider, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Retry a request on 429 responses with exponential backoff.
///
/// Returns the first non-429 response. Once `max_retries` is exhausted the
/// error is `ModelError::RateLimited`; with `max_retries == 0` the request is
/// sent exactly once.
pub(super) async fn retry_on_rate_limit<F, Fut>(
    provider: &str,
    max_retries: u32,
    make_request: F,
) -> Result<reqwest::Response, ModelError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, ModelError>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;

        if response.status().as_u16() != 429 {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let retry_after_secs = retry_after.as_deref().and_then(|s| s.trim().parse::<u64>().ok());

        if attempt >= max_retries {
            return Err(ModelError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            });
        }

        let wait = parse_retry_after(retry_after.as_deref())
            .unwrap_or_else(|| backoff_delay(attempt, 1000));

        warn!(
            "{} rate limited (attempt {}), waiting {:?}",
            provider,
            attempt + 1,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
