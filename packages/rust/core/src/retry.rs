//! Explicit retry policy for collaborator calls.

use std::future::Future;
use std::time::Duration;

use eventfinder_shared::{EventFinderError, Result};
use tracing::warn;

/// `{max_attempts, backoff, multiplier, retryable}` applied around an async operation.
///
/// The delay before attempt `n + 1` is `backoff * multiplier^(n - 1)`. Errors
/// rejected by `retryable` are returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub multiplier: u32,
    pub retryable: fn(&EventFinderError) -> bool,
}

impl RetryPolicy {
    /// Retry transient errors up to `max_attempts` times, doubling the backoff.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            multiplier: 2,
            retryable: EventFinderError::is_retryable,
        }
    }

    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_retryable(mut self, retryable: fn(&EventFinderError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Run `op` until it succeeds, fails terminally or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && (self.retryable)(&e) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(self.multiplier);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(fail_times: u32, calls: &AtomicU32) -> Result<&'static str> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < fail_times {
            Err(EventFinderError::Network("connection reset".into()))
        } else {
            Ok("ok")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let result = policy.run("search", move || async move { flaky(2, calls) }).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let result = policy.run("search", move || async move { flaky(10, calls) }).await;

        assert!(matches!(result, Err(EventFinderError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let start = tokio::time::Instant::now();

        let _ = policy.run("search", move || async move { flaky(10, calls) }).await;

        // 500ms then 1000ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1600), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result: Result<()> = policy
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EventFinderError::config("missing key"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_once_and_custom_predicate() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::once()
            .run("extract", move || async move { flaky(1, calls) })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO).with_retryable(|_| true);
        let result: Result<()> = policy
            .run("extract", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EventFinderError::Extraction("bad page".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
