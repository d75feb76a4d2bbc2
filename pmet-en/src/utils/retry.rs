//! API retry controller
//!
//! Wraps a single provider call with bounded retry and differentiated
//! backoff.
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If rate-limited (429): backoff `rate_limit_backoff × attempt`, retry
//! 4. If server (5xx) or network failure: backoff `transient_backoff`, retry
//! 5. If any other failure: return it immediately (no retry); the caller
//!    decides what an authoritative rejection means
//! 6. If `max_attempts` consumed on retryable failures: return `Exhausted`
//!
//! `Exhausted` means the operation was never completed — callers must treat
//! the record as still pending, never as "not found".

use crate::services::provider::ApiError;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a retried operation that never produced a success
#[derive(Debug, Error)]
pub enum RetryError {
    /// Non-retryable response, surfaced unchanged on the first attempt
    #[error("{0}")]
    Fatal(ApiError),

    /// All attempts consumed on retryable failures
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ApiError },
}

impl RetryError {
    /// True when the failure was retried to exhaustion rather than
    /// rejected outright
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Retry tuning for provider calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up on retryable failures
    pub max_attempts: u32,
    /// Base backoff for HTTP 429, scaled by the attempt number
    pub rate_limit_backoff: Duration,
    /// Fixed backoff for server and network failures
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff: Duration::from_secs(5),
            transient_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Default backoffs with a caller-chosen attempt budget
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Run an operation through the retry policy
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g. "openalex search")
/// * `policy` - Attempt budget and backoff durations
/// * `operation` - Async closure performing one attempt
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                return Err(RetryError::Fatal(err));
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted, operation never completed"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let backoff = match &err {
                    ApiError::RateLimited => policy.rate_limit_backoff * attempt,
                    _ => policy.transient_backoff,
                };

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Retryable API failure, backing off"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            rate_limit_backoff: Duration::from_millis(1),
            transient_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_first_attempt() {
        let result = with_retry("test_op", &fast_policy(3), || async {
            Ok::<i32, ApiError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut attempts = 0;

        let result = with_retry("test_op", &fast_policy(5), || {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt < 3 {
                    Err(ApiError::Server(503))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let mut attempts = 0;

        let result = with_retry("test_op", &fast_policy(5), || {
            attempts += 1;
            async move { Err::<i32, ApiError>(ApiError::Status(404, "missing".to_string())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(RetryError::Fatal(ApiError::Status(404, _)))
        ));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempt_count() {
        let mut attempts = 0;

        let result = with_retry("test_op", &fast_policy(3), || {
            attempts += 1;
            async move { Err::<i32, ApiError>(ApiError::RateLimited) }
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts: n, last }) => {
                assert_eq!(n, 3);
                assert!(matches!(last, ApiError::RateLimited));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn exhaustion_is_distinguishable_from_rejection() {
        let exhausted = with_retry("test_op", &fast_policy(2), || async {
            Err::<i32, ApiError>(ApiError::Network("reset".to_string()))
        })
        .await
        .unwrap_err();
        assert!(exhausted.is_exhausted());

        let fatal = with_retry("test_op", &fast_policy(2), || async {
            Err::<i32, ApiError>(ApiError::Parse("bad".to_string()))
        })
        .await
        .unwrap_err();
        assert!(!fatal.is_exhausted());
    }
}
