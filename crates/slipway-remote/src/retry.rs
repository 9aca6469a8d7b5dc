//! Bounded retry with exponential backoff.
//!
//! The single resilience primitive for remote calls: wrap any one call in
//! [`with_backoff`] rather than re-implementing retries at call sites.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use slipway_core::api::{ApiError, ApiResult};

/// Retry bounds for one remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Run `op` until it succeeds or the attempt bound is hit.
///
/// Only transient failures are retried; [`ApiError::NotFound`] is returned
/// immediately since the answer will not change.
pub async fn with_backoff<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e @ ApiError::NotFound(_)) => return Err(e),
            Err(e) if attempt >= policy.max_attempts => {
                warn!(label, attempt, error = %e, "remote call failed, attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.base_delay * 2u32.saturating_pow(attempt - 1);
                warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "remote call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
