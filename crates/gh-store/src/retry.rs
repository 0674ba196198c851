//! Exponential backoff for rate-limited gateway calls.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::gateway::GatewayError;

/// Call `f` until it succeeds, a non-rate-limit error occurs, or the retry
/// budget is exhausted. Sleeps `backoff_factor.powi(attempt)` seconds between
/// attempts, logging each retry via `tracing`.
///
/// # Errors
/// Returns whatever error `f` last produced, once it is not rate-limiting or
/// the retry budget is exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: GatewayError,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempt + 1 < config.max_attempts => {
                let delay = config.backoff_factor.powi(attempt.try_into().unwrap_or(i32::MAX));
                tracing::warn!(attempt, delay_secs = delay, "rate limited, retrying after backoff");
                tokio::time::sleep(Duration::from_secs_f64(delay.max(0.0))).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct FlakyError {
        rate_limited: bool,
    }

    impl GatewayError for FlakyError {
        fn is_rate_limited(&self) -> bool {
            self.rate_limited
        }
    }

    #[tokio::test]
    async fn succeeds_after_retrying_rate_limited_errors() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff_factor: 0.0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: Result<u32, FlakyError> = with_retry(&config, || {
            let calls = Arc::clone(&calls_clone);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FlakyError { rate_limited: true })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_rate_limited_errors_are_not_retried() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff_factor: 0.0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: Result<u32, FlakyError> = with_retry(&config, || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError { rate_limited: false })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retry_budget_surfaces_the_error() {
        let config = RetryConfig {
            max_attempts: 2,
            backoff_factor: 0.0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: Result<u32, FlakyError> = with_retry(&config, || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FlakyError { rate_limited: true })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
