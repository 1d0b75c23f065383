use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::errors::FetchError;

pub type DelayFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Bounded retry with linear backoff, applied to rate-limited calls only.
///
/// Attempt `n` (starting at 1) that is rate limited waits `base_delay * n`
/// before attempt `n + 1`. The last rate-limited error is returned once
/// `max_attempts` calls have been made. Transient and malformed failures are
/// returned on first occurrence.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    delay: DelayFn,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self::with_delay(
            max_attempts,
            base_delay,
            Arc::new(|wait: Duration| tokio::time::sleep(wait).boxed()),
        )
    }

    pub fn with_delay(max_attempts: u32, base_delay: Duration, delay: DelayFn) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            delay,
        }
    }

    /// Retries without ever sleeping.
    pub fn without_delay(max_attempts: u32) -> Self {
        Self::with_delay(
            max_attempts,
            Duration::ZERO,
            Arc::new(|_: Duration| future::ready(()).boxed()),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.base_delay.saturating_mul(attempt);
                    tracing::debug!(
                        label,
                        attempt,
                        delay_ms = wait.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    (self.delay)(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
