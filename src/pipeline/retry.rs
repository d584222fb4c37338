//! Orchestrator-level retry for model calls.

use std::future::Future;

use tracing::warn;

use crate::ingestion::ExtractionError;
use crate::model::backoff_delay;

/// How many times a model call may be attempted.
///
/// Only `ServiceUnavailable` failures are retried; a malformed or
/// out-of-taxonomy answer is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_shot()
    }
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn single_shot() -> Self {
        Self {
            max_attempts: 1,
            backoff_base_ms: 1000,
        }
    }

    pub fn new(max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base_ms,
        }
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ExtractionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExtractionError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let wait = backoff_delay(attempt, self.backoff_base_ms);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        self.max_attempts,
                        wait,
                        e
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
