//! Bounded retry with a flat delay, gated by the circuit breaker.
//!
//! The policy is stateless configuration reused across calls; attempt
//! counters live on the stack of each [`execute`](RetryPolicy::execute)
//! invocation. Every attempt consults the breaker first, so attempts
//! made after the breaker opens mid-sequence fast-fail as rejections
//! instead of sleeping and retrying against a known-bad dependency.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::breaker::CircuitBreaker;
use crate::clock::Clock;
use crate::error::{ConfigError, ConfigResult, FailureKind};

/// Retry configuration: attempt budget and flat wait between attempts.
///
/// No jitter and no backoff growth; the wait is a fixed duration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Flat delay between consecutive attempts.
    pub wait_between_attempts: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, wait_between_attempts: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Create a policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Execute `operation` under this policy, consulting `breaker` on
    /// every attempt.
    ///
    /// Each attempt first asks the breaker for a permit. A rejection
    /// counts against the attempt budget but does not invoke the
    /// operation and records nothing into the breaker's window. A
    /// granted attempt invokes the operation outside the breaker's
    /// lock and reports the outcome back. The first success returns
    /// immediately; once the budget is spent the most recent failure
    /// is surfaced wrapped in [`FailureKind::RetriesExhausted`].
    ///
    /// The between-attempt sleep suspends the calling task without
    /// blocking unrelated work and holds no breaker lock.
    #[instrument(skip(self, breaker, operation), fields(max_attempts = self.max_attempts))]
    pub async fn execute<C, F, Fut, T, E>(
        &self,
        breaker: &CircuitBreaker<C>,
        mut operation: F,
    ) -> Result<T, FailureKind<E>>
    where
        C: Clock,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let failure = match breaker.try_acquire() {
                None => {
                    debug!(attempt, "Attempt rejected by circuit breaker");
                    FailureKind::CircuitOpenRejected
                }
                Some(permit) => match operation().await {
                    Ok(value) => {
                        breaker.record_outcome(permit, true);
                        if attempt > 1 {
                            debug!(attempt, "Operation succeeded after retries");
                        }
                        return Ok(value);
                    }
                    Err(source) => {
                        breaker.record_outcome(permit, false);
                        warn!(attempt, error = %source, "Protected operation failed");
                        FailureKind::OperationFailed { source }
                    }
                },
            };

            if attempt >= self.max_attempts {
                warn!(attempts = attempt, "Attempt budget exhausted");
                return Err(FailureKind::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            tokio::time::sleep(self.wait_between_attempts).await;
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn wait_between_attempts(mut self, wait: Duration) -> Self {
        self.policy.wait_between_attempts = wait;
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the retry loop and its breaker composition.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::breaker::BreakerConfig;

    #[derive(Debug, thiserror::Error)]
    #[error("downstream failure")]
    struct DownstreamError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .wait_between_attempts(Duration::from_millis(1))
            .build()
            .expect("policy should be valid")
    }

    /// Validates `RetryPolicy::default` values.
    ///
    /// Assertions:
    /// - Confirms `max_attempts` equals `3`.
    /// - Confirms `wait_between_attempts` equals 500ms.
    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.wait_between_attempts, Duration::from_millis(500));
    }

    /// Validates builder validation rejects a zero attempt budget.
    ///
    /// Assertions:
    /// - Ensures `max_attempts(0)` fails to build.
    /// - Ensures a zero wait is accepted.
    #[test]
    fn test_retry_policy_validation() {
        assert!(RetryPolicy::builder().max_attempts(0).build().is_err());
        assert!(RetryPolicy::builder()
            .max_attempts(1)
            .wait_between_attempts(Duration::ZERO)
            .build()
            .is_ok());
    }

    /// Tests an operation that fails twice then succeeds returns
    /// success after exactly three invocations.
    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = fast_policy(3);
        let breaker = CircuitBreaker::with_defaults();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = policy
            .execute(&breaker, || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DownstreamError)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("should succeed on third attempt"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "Operation invoked exactly 3 times");
    }

    /// Tests the first success short-circuits remaining attempts.
    #[tokio::test]
    async fn test_success_returns_immediately() {
        let policy = fast_policy(5);
        let breaker = CircuitBreaker::with_defaults();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = policy
            .execute(&breaker, || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DownstreamError>("ok")
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Tests a persistently failing operation exhausts the budget and
    /// surfaces the last operation failure.
    #[tokio::test]
    async fn test_exhausts_attempts_on_persistent_failure() {
        let policy = fast_policy(3);
        let breaker = CircuitBreaker::with_defaults();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), _> = policy
            .execute(&breaker, || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DownstreamError)
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(FailureKind::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FailureKind::OperationFailed { .. }));
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
    }

    /// Tests that once the breaker opens after the first failure, the
    /// remaining attempts are rejected without invoking the operation
    /// and the final error wraps a rejection, not the original failure.
    #[tokio::test]
    async fn test_open_breaker_fast_fails_remaining_attempts() {
        let policy = fast_policy(3);
        // Window of one failure is enough to trip
        let config = BreakerConfig::builder()
            .sliding_window_capacity(1)
            .min_calls(1)
            .failure_rate_threshold(50.0)
            .open_timeout(Duration::from_secs(60))
            .build()
            .expect("config should be valid");
        let breaker = CircuitBreaker::new(config).expect("breaker should build");
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), _> = policy
            .execute(&breaker, || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DownstreamError)
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1, "Attempts 2 and 3 must not invoke the operation");
        match result {
            Err(err @ FailureKind::RetriesExhausted { .. }) => {
                assert!(err.is_rejection(), "Final error should wrap the circuit-open rejection");
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
    }

    /// Tests rejected attempts leave the breaker window untouched.
    #[tokio::test]
    async fn test_rejections_record_no_window_evidence() {
        let policy = fast_policy(4);
        let config = BreakerConfig::builder()
            .sliding_window_capacity(1)
            .min_calls(1)
            .open_timeout(Duration::from_secs(60))
            .build()
            .expect("config should be valid");
        let breaker = CircuitBreaker::new(config).expect("breaker should build");

        let _: Result<(), _> = policy.execute(&breaker, || async { Err(DownstreamError) }).await;

        // One real failure tripped the breaker; the three rejections
        // that followed added nothing to the window
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.window_len, 1);
    }
}
