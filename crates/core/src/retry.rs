use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::IntegrationError;

/// Bounded retry for idempotent external calls (listing, search, reads).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1, base_delay_ms: 250, max_delay_ms: 2_000 }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    pub fn none() -> Self {
        Self { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.base_delay_ms.saturating_mul(u64::from(attempt) + 1).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, IntegrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IntegrationError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        event_name = "integration.call.retrying",
                        operation,
                        service = %error.service(),
                        attempt,
                        max_retries = self.max_retries,
                        error_class = error.error_class(),
                        error = %error,
                        "retrying idempotent external call"
                    );
                    let delay = self.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
