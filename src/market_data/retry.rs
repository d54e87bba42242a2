use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Timeout and retry budget for idempotent external lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// One attempt, no backoff. For tests and non-idempotent calls.
    pub fn once(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
            timeout,
        }
    }

    /// Run `call` until it succeeds or the attempts are used up. Each attempt
    /// is bounded by `timeout`; attempt `n` waits `n × backoff` before the
    /// next one.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }
                .into()),
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt < attempts {
                        warn!(operation, attempt, max_attempts = attempts, error = %err, "retrying");
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{operation} was never attempted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn retries_until_success() -> Result<()> {
        let calls = AtomicU32::new(0);
        let value = fast(3)
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("transient");
                }
                Ok(7)
            })
            .await?;
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(2)
            .run("broken", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("down")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let policy = RetryPolicy::once(Duration::from_millis(10));
        let result: Result<()> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Timeout { .. })
        ));
    }
}
