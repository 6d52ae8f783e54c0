use crate::config::RetryConfig;
use crate::error::GenerationError;
use crate::provider::FailureKind;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Whether resubmitting the identical request can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

impl ErrorClass {
    pub fn of(err: &GenerationError) -> Self {
        match err.kind {
            FailureKind::Timeout
            | FailureKind::Connection
            | FailureKind::RateLimited
            | FailureKind::ServerError
            | FailureKind::MalformedResponse => ErrorClass::Retryable,
            FailureKind::Rejected
            | FailureKind::InvalidRequest
            | FailureKind::Cancelled
            | FailureKind::Panicked => ErrorClass::Fatal,
        }
    }
}

/// Final result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Delay after the `attempt`-th failure: `min(base * 2^(attempt-1), max)`
/// plus up to `base` of jitter
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    let exp = config
        .backoff_base_ms
        .saturating_mul(factor)
        .min(config.backoff_max_ms);
    let jitter = rand::thread_rng().gen_range(0..=config.backoff_base_ms);
    Duration::from_millis(exp.saturating_add(jitter))
}

/// Execute an async operation with jittered exponential backoff.
///
/// Errors for which `is_retryable` returns false end the loop immediately.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> Retried<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                return Retried {
                    result: Ok(result),
                    attempts,
                }
            }
            Err(e) if !is_retryable(&e) => {
                warn!("Attempt {} failed with non-retryable error: {}", attempts, e);
                return Retried {
                    result: Err(e),
                    attempts,
                };
            }
            Err(e) if attempts >= max_attempts => {
                warn!("All {} attempts failed: {}", attempts, e);
                return Retried {
                    result: Err(e),
                    attempts,
                };
            }
            Err(e) => {
                let delay = backoff_delay(config, attempts);
                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, e, delay
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let retried: Retried<i32, &str> =
            retry_with_backoff(&config(3), |_| true, || async { Ok(42) }).await;

        assert_eq!(retried.result.unwrap(), 42);
        assert_eq!(retried.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let retried: Retried<i32, &str> = retry_with_backoff(
            &config(3),
            |_| true,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(retried.result.unwrap(), 42);
        assert_eq!(retried.attempts, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_all_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let retried: Retried<i32, &str> = retry_with_backoff(
            &config(4),
            |_| true,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("always fails")
                }
            },
        )
        .await;

        assert!(retried.result.is_err());
        assert_eq!(retried.attempts, 4);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_after_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let retried: Retried<i32, GenerationError> = retry_with_backoff(
            &config(5),
            |e| ErrorClass::of(e) == ErrorClass::Retryable,
            || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(GenerationError::new(FailureKind::Rejected, "bad request"))
                }
            },
        )
        .await;

        assert_eq!(retried.attempts, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(retried.result.unwrap_err().kind, FailureKind::Rejected);
    }

    #[test]
    fn test_classification() {
        let retryable = [
            FailureKind::Timeout,
            FailureKind::Connection,
            FailureKind::RateLimited,
            FailureKind::ServerError,
            FailureKind::MalformedResponse,
        ];
        for kind in retryable {
            assert_eq!(
                ErrorClass::of(&GenerationError::new(kind, "")),
                ErrorClass::Retryable
            );
        }
        for kind in [FailureKind::Rejected, FailureKind::InvalidRequest] {
            assert_eq!(
                ErrorClass::of(&GenerationError::new(kind, "")),
                ErrorClass::Fatal
            );
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            backoff_base_ms: 100,
            backoff_max_ms: 1000,
        };
        let first = backoff_delay(&config, 1).as_millis();
        assert!((100..=200).contains(&first));
        let third = backoff_delay(&config, 3).as_millis();
        assert!((400..=500).contains(&third));
        let capped = backoff_delay(&config, 60).as_millis();
        assert!((1000..=1100).contains(&capped));
    }

    #[test]
    fn test_zero_base_has_no_delay() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        };
        assert_eq!(backoff_delay(&config, 2), Duration::ZERO);
    }
}
