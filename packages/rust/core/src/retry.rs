//! Timeout + bounded exponential-backoff retry around capability calls.

use std::future::Future;
use std::time::Duration;

use hireflow_shared::{HireflowError, PipelineSection, Result};
use tracing::warn;

/// How a single capability call is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before retry `n` is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl From<&PipelineSection> for CallPolicy {
    fn from(section: &PipelineSection) -> Self {
        Self {
            timeout: Duration::from_secs(section.call_timeout_secs),
            max_retries: section.max_retries,
            base_delay: Duration::from_millis(section.retry_base_delay_ms),
        }
    }
}

impl CallPolicy {
    fn backoff(&self, attempt: u32, error: &HireflowError) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        match error.retry_after_ms().map(Duration::from_millis) {
            Some(hint) if hint > exponential => hint,
            _ => exponential,
        }
    }
}

/// Run `op` under `policy`. Retryable failures (network, rate limit,
/// timeout) are retried; anything else returns immediately.
pub async fn call_with_policy<T, F, Fut>(policy: &CallPolicy, capability: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(HireflowError::Timeout {
                capability: capability.to_string(),
                after_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.backoff(attempt, &e);
                warn!(
                    capability,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = call_with_policy(&fast_policy(3), "test", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(HireflowError::Network("reset".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = call_with_policy(&fast_policy(2), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HireflowError::RateLimited {
                retry_after_ms: None,
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = call_with_policy(&fast_policy(3), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HireflowError::Unavailable("no profile".into()))
        })
        .await;
        assert!(matches!(result, Err(HireflowError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<()> = call_with_policy(&fast_policy(0), "slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(HireflowError::Timeout { .. })));
    }

    #[test]
    fn backoff_is_exponential_and_honors_hints() {
        let policy = CallPolicy {
            timeout: Duration::from_secs(1),
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        let net = HireflowError::Network("x".into());
        assert_eq!(policy.backoff(1, &net), Duration::from_millis(100));
        assert_eq!(policy.backoff(3, &net), Duration::from_millis(400));

        let hinted = HireflowError::RateLimited {
            retry_after_ms: Some(1_000),
        };
        assert_eq!(policy.backoff(1, &hinted), Duration::from_millis(1_000));
    }
}
