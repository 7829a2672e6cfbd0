//! Retry with a fixed backoff, for upstream reads.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::client::UpstreamError;

/// How many extra attempts to make, and how long to wait before each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_secs(2),
        }
    }
}

/// The final error after every attempt was spent or a non-retryable error
/// stopped the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: UpstreamError,
    pub attempts: u32,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts > 1 {
            write!(f, "{} (after {} attempts)", self.error, self.attempts)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl std::error::Error for RetryFailure {}

/// Run `op`, retrying only on [`UpstreamError::RateLimited`].
///
/// The backoff is a `tokio` sleep, so only the calling task waits.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempts <= policy.max_retries => {
                tracing::warn!(
                    operation = label,
                    attempt = attempts,
                    of = policy.max_retries + 1,
                    backoff_secs = policy.backoff.as_secs_f64(),
                    "rate limited, backing off"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(error) => return Err(RetryFailure { error, attempts }),
        }
    }
}
