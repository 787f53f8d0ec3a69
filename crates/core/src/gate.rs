//! Composition facade: retry + breaker (+ optional periodic reset)
//! behind a single `execute` entry point.
//!
//! This is the surface a harness consumes: build a [`FaultGate`] once
//! with the full configuration, share it, and call
//! [`execute`](FaultGate::execute) per logical request. One gate
//! protects one logical operation type; all concurrent callers share
//! its breaker.

use std::future::Future;
use std::time::Duration;

use crate::breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigResult, FailureKind};
use crate::retry::RetryPolicy;
use crate::scheduler::ResetScheduler;

/// Full configuration surface, fixed at construction.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Total attempts per `execute` call, including the first (>= 1).
    pub max_attempts: u32,
    /// Flat delay between attempts.
    pub wait_between_attempts: Duration,
    /// Failure rate percentage (0-100) that opens the breaker.
    pub failure_rate_threshold: f64,
    /// Sliding window capacity (>= 1).
    pub sliding_window_capacity: usize,
    /// Calls required before the failure rate is evaluated; defaults
    /// to a full window.
    pub min_calls: Option<usize>,
    /// Time the breaker stays open before probing.
    pub open_timeout: Duration,
    /// Trial calls admitted while half-open.
    pub half_open_permits: u32,
    /// Periodic unconditional reset; `None` (the default) disables the
    /// scheduler entirely.
    pub reset_interval: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        let breaker = BreakerConfig::default();
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            wait_between_attempts: retry.wait_between_attempts,
            failure_rate_threshold: breaker.failure_rate_threshold,
            sliding_window_capacity: breaker.sliding_window_capacity,
            min_calls: breaker.min_calls,
            open_timeout: breaker.open_timeout,
            half_open_permits: breaker.half_open_permits,
            reset_interval: None,
        }
    }
}

impl GateConfig {
    /// Create a configuration builder.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }

    fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .wait_between_attempts(self.wait_between_attempts)
            .build()
    }

    fn breaker_config(&self) -> ConfigResult<BreakerConfig> {
        let mut builder = BreakerConfig::builder()
            .failure_rate_threshold(self.failure_rate_threshold)
            .sliding_window_capacity(self.sliding_window_capacity)
            .open_timeout(self.open_timeout)
            .half_open_permits(self.half_open_permits);
        if let Some(min_calls) = self.min_calls {
            builder = builder.min_calls(min_calls);
        }
        builder.build()
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    pub fn new() -> Self {
        Self { config: GateConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn wait_between_attempts(mut self, wait: Duration) -> Self {
        self.config.wait_between_attempts = wait;
        self
    }

    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.config.failure_rate_threshold = threshold;
        self
    }

    pub fn sliding_window_capacity(mut self, capacity: usize) -> Self {
        self.config.sliding_window_capacity = capacity;
        self
    }

    pub fn min_calls(mut self, min_calls: usize) -> Self {
        self.config.min_calls = Some(min_calls);
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn half_open_permits(mut self, permits: u32) -> Self {
        self.config.half_open_permits = permits;
        self
    }

    /// Enable the periodic forced reset. Deliberately opt-in; see
    /// [`ResetScheduler`] for why you probably do not want this
    /// outside a demonstration.
    pub fn reset_interval(mut self, interval: Duration) -> Self {
        self.config.reset_interval = Some(interval);
        self
    }

    pub fn config(self) -> ConfigResult<GateConfig> {
        // Validation happens through the component builders
        self.config.retry_policy()?;
        self.config.breaker_config()?;
        Ok(self.config)
    }

    /// Build a gate on the system clock.
    pub fn build(self) -> ConfigResult<FaultGate> {
        FaultGate::new(self.config)
    }
}

/// Retry + circuit-breaker layer around one logical operation type.
#[derive(Debug)]
pub struct FaultGate<C: Clock = SystemClock> {
    retry: RetryPolicy,
    breaker: CircuitBreaker<C>,
    scheduler: Option<ResetScheduler>,
}

impl FaultGate<SystemClock> {
    /// Create a gate from `config` using the system clock.
    ///
    /// When `config.reset_interval` is set this spawns the reset task
    /// and therefore must be called from within a tokio runtime.
    pub fn new(config: GateConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a gate builder.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::new()
    }
}

impl<C: Clock> FaultGate<C> {
    /// Create a gate from `config` with a custom clock.
    pub fn with_clock(config: GateConfig, clock: C) -> ConfigResult<Self> {
        let retry = config.retry_policy()?;
        let breaker = CircuitBreaker::with_clock(config.breaker_config()?, clock)?;
        let scheduler = config
            .reset_interval
            .map(|interval| ResetScheduler::spawn(breaker.clone(), interval));
        Ok(Self { retry, breaker, scheduler })
    }

    /// Execute a fallible operation under retry and breaker
    /// protection. The single entry point of the engine.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.retry.execute(&self.breaker, operation).await
    }

    /// Read-only snapshot of the shared breaker.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// The shared breaker behind this gate.
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Whether the periodic forced reset is active.
    pub fn has_reset_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }
}
