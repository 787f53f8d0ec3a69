//! Circuit breaker state machine.
//!
//! # States
//! - Closed: normal operation, permits always granted
//! - Open: dependency assumed down, calls rejected fast
//! - Half-Open: limited trial calls test whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed    --(failure rate >= threshold, data sufficient)--> Open
//! Open      --(elapsed >= open_timeout)--> HalfOpen
//! HalfOpen  --(trial success)--> Closed
//! HalfOpen  --(trial failure)--> Open
//! any state --(force_reset)--> Closed
//! ```
//!
//! Callers interact through a permit protocol: [`try_acquire`]
//! grants a [`Permit`] or rejects, the protected call runs outside the
//! breaker's lock, and [`record_outcome`] consumes the permit to feed
//! the result back. Rejections are reported as a distinct failure
//! kind and are never recorded into the sliding window.
//!
//! [`try_acquire`]: CircuitBreaker::try_acquire
//! [`record_outcome`]: CircuitBreaker::record_outcome

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, ConfigResult};
use crate::window::SlidingOutcomeWindow;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests.
    Closed,
    /// Circuit is open, rejecting requests.
    Open,
    /// Circuit is half-open, allowing limited trial requests.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failure rate percentage (0-100) at or above which the closed
    /// circuit opens.
    pub failure_rate_threshold: f64,
    /// Number of recent call outcomes kept in the sliding window.
    pub sliding_window_capacity: usize,
    /// Recorded calls required before the failure rate is evaluated.
    /// Defaults to the window capacity (a full window).
    pub min_calls: Option<usize>,
    /// Time the breaker stays open before admitting trial calls.
    pub open_timeout: Duration,
    /// Number of trial calls admitted in half-open before a decision.
    pub half_open_permits: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_capacity: 10,
            min_calls: None,
            open_timeout: Duration::from_secs(30),
            half_open_permits: 1,
        }
    }
}

impl BreakerConfig {
    /// Create a configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=100.0).contains(&self.failure_rate_threshold) {
            return Err(ConfigError::Invalid {
                message: "failure_rate_threshold must be within 0-100".to_string(),
            });
        }

        if self.sliding_window_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "sliding_window_capacity must be greater than 0".to_string(),
            });
        }

        if self.min_calls == Some(0) {
            return Err(ConfigError::Invalid {
                message: "min_calls must be greater than 0".to_string(),
            });
        }

        if self.half_open_permits == 0 {
            return Err(ConfigError::Invalid {
                message: "half_open_permits must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    fn effective_min_calls(&self) -> usize {
        self.min_calls.unwrap_or(self.sliding_window_capacity)
    }
}

/// Builder for [`BreakerConfig`].
#[derive(Debug, Default)]
pub struct BreakerConfigBuilder {
    config: BreakerConfig,
}

impl BreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: BreakerConfig::default() }
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

    pub fn build(self) -> ConfigResult<BreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Proof that the breaker admitted one call.
///
/// A permit is granted by [`CircuitBreaker::try_acquire`] and must be
/// resolved by passing it back to [`CircuitBreaker::record_outcome`].
/// It records which state issued it so an outcome that lands after the
/// breaker moved on (for example, a forced reset overtook an in-flight
/// trial) can be folded in or dropped without corrupting the machine.
#[derive(Debug)]
#[must_use = "a granted permit must be resolved with record_outcome"]
pub struct Permit {
    issued_in: CircuitState,
}

impl Permit {
    fn new(issued_in: CircuitState) -> Self {
        Self { issued_in }
    }

    /// State the breaker was in when this permit was granted.
    pub fn issued_in(&self) -> CircuitState {
        self.issued_in
    }
}

/// Read-only view of the breaker for logging and metrics collaborators.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub window_len: usize,
    pub window_capacity: usize,
    pub failure_rate: Option<f64>,
    /// How long the breaker has been open, when it is.
    pub open_for: Option<Duration>,
    pub trial_permits_left: u32,
}

/// Mutable breaker state; every field is guarded by the one mutex.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: SlidingOutcomeWindow,
    /// Set exactly while `state == Open`.
    opened_at: Option<Instant>,
    /// Trial permits remaining while `state == HalfOpen`.
    trial_permits_left: u32,
}

/// Circuit breaker over a sliding outcome window.
///
/// All state transitions and window mutations are serialized under a
/// single mutex so concurrent callers can share one instance; the lock
/// is held only for acquire/record bookkeeping, never across the
/// protected call. Cloning is cheap and shares the same state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: BreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock.
    pub fn new(config: BreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration.
    pub fn with_defaults() -> Self {
        let config = BreakerConfig::default();
        let inner = Self::initial_inner(&config);
        Self { config, inner, clock: Arc::new(SystemClock) }
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for
    /// testing timeout behavior deterministically).
    pub fn with_clock(config: BreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let inner = Self::initial_inner(&config);
        Ok(Self { config, inner, clock: Arc::new(clock) })
    }

    fn initial_inner(config: &BreakerConfig) -> Arc<Mutex<BreakerInner>> {
        Arc::new(Mutex::new(BreakerInner {
            state: CircuitState::Closed,
            window: SlidingOutcomeWindow::new(
                config.sliding_window_capacity,
                config.effective_min_calls(),
            ),
            opened_at: None,
            trial_permits_left: 0,
        }))
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Circuit breaker state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Ask the breaker to admit one call.
    ///
    /// Returns a [`Permit`] when the call may proceed, or `None` when
    /// the caller must not invoke the protected operation. An open
    /// breaker whose timeout has elapsed transitions to half-open here
    /// and grants the first trial permit; granting a trial permit is
    /// atomic with checking how many trials remain outstanding.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Some(Permit::new(CircuitState::Closed)),
            CircuitState::Open => {
                let now = self.clock.now();
                let expired = match inner.opened_at {
                    Some(opened_at) => {
                        now.duration_since(opened_at) >= self.config.open_timeout
                    }
                    None => true,
                };
                if !expired {
                    debug!(state = %inner.state, "Circuit breaker rejecting call");
                    return None;
                }

                inner.state = CircuitState::HalfOpen;
                inner.opened_at = None;
                inner.trial_permits_left = self.config.half_open_permits - 1;
                info!(
                    trial_permits = self.config.half_open_permits,
                    "Circuit breaker half-open, admitting trial call"
                );
                Some(Permit::new(CircuitState::HalfOpen))
            }
            CircuitState::HalfOpen => {
                if inner.trial_permits_left == 0 {
                    debug!(state = %inner.state, "Circuit breaker rejecting call, trial outstanding");
                    return None;
                }
                inner.trial_permits_left -= 1;
                Some(Permit::new(CircuitState::HalfOpen))
            }
        }
    }

    /// Feed the outcome of an admitted call back into the breaker,
    /// consuming its permit.
    ///
    /// In the closed state the outcome lands in the sliding window and
    /// a sufficient failure rate trips the breaker open. In half-open
    /// a trial success closes the breaker and a trial failure re-opens
    /// it, discarding stale window history either way. An outcome
    /// whose permit no longer matches the current state (a forced
    /// reset or a competing trial got there first) is folded into the
    /// closed window when possible and dropped otherwise.
    pub fn record_outcome(&self, permit: Permit, success: bool) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.window.record(success);
                if success {
                    return;
                }
                let rate = match inner.window.failure_rate() {
                    Some(rate) => rate,
                    None => return,
                };
                if rate >= self.config.failure_rate_threshold {
                    self.trip_open(&mut inner, rate);
                }
            }
            CircuitState::HalfOpen if permit.issued_in == CircuitState::HalfOpen => {
                if success {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.trial_permits_left = 0;
                    inner.window.reset();
                    info!("Circuit breaker closed after successful trial call");
                } else {
                    inner.window.reset();
                    self.trip_open(&mut inner, 100.0);
                }
            }
            state => {
                debug!(%state, issued_in = %permit.issued_in, success, "Dropping outcome for stale permit");
            }
        }
    }

    fn trip_open(&self, inner: &mut BreakerInner, rate: f64) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.trial_permits_left = 0;
        warn!(
            failure_rate = rate,
            open_timeout_ms = self.config.open_timeout.as_millis() as u64,
            "Circuit breaker opened"
        );
    }

    /// Unconditionally force the breaker closed and clear its window.
    ///
    /// This bypasses the evidence-based transition rules entirely; it
    /// exists for the periodic reset override, not as a recovery
    /// signal.
    pub fn force_reset(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.trial_permits_left = 0;
        inner.window.reset();
        info!(%previous, "Circuit breaker force-reset to closed");
    }

    /// Current state of the breaker.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Read-only snapshot of breaker state and window occupancy.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            window_len: inner.window.len(),
            window_capacity: inner.window.capacity(),
            failure_rate: inner.window.failure_rate(),
            open_for: inner.opened_at.map(|opened_at| self.clock.now().duration_since(opened_at)),
            trial_permits_left: inner.trial_permits_left,
        }
    }
}
