//! Retry with exponential backoff for Fabric API calls (§4.M).
//!
//! Honors a server-supplied `Retry-After` hint over the computed backoff,
//! and caps attempts per operation kind rather than using one global policy.

use std::time::Duration;

use tracing::{debug, warn};

use crate::cancellation::{CancellationToken, CancellationTokenSource};
use crate::error::{ClientError, OperationCancelled};

/// Per-operation retry budget. `get_definition` gets a higher ceiling since
/// large bundle downloads are worth persisting through more transient blips.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// list/get/create/update/delete.
    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }

    /// get_definition.
    pub fn definition_fetch() -> Self {
        Self {
            max_attempts: 15,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let computed = self.base_delay.saturating_mul(exp as u32);
        computed.min(self.max_delay)
    }

    /// Delay before the next attempt, honoring a server `Retry-After` hint
    /// (in seconds) when present over the computed exponential backoff.
    fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs).min(self.max_delay),
            None => self.backoff_for(attempt),
        }
    }
}

/// Retry an async Fabric API call under `policy`, honoring the token's
/// cancellation and the error's own retryability (`ClientError::is_retryable`).
///
/// Sleeps are sliced to 1 second so cancellation is observed promptly even
/// during a long backoff.
pub async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    token: &CancellationToken,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        cancelled_to_client(token.throw_if_cancelled(operation_name))?;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return Err(err);
                }

                let retry_after = match &err {
                    ClientError::Transient { retry_after, .. } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_for(attempt, retry_after);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "retrying after delay"
                );
                cancelled_to_client(token.sleep_cancellable(delay, operation_name).await)?;
            }
        }
    }
}

fn cancelled_to_client(result: Result<(), OperationCancelled>) -> Result<(), ClientError> {
    result.map_err(|e| ClientError::Request(e.to_string()))
}
