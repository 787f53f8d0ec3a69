//! Periodic forced reset of a circuit breaker.
//!
//! On every tick the scheduler calls
//! [`force_reset`](crate::breaker::CircuitBreaker::force_reset) on the
//! attached breaker, unconditionally returning it to closed with a
//! clean window. This is an override, not a recovery signal: it will
//! re-admit full traffic on schedule even during a real, ongoing
//! outage, independently of the breaker's own open-timeout probe path.
//! It exists to reproduce the original demonstration behavior and is
//! strictly opt-in; leave it unconfigured in anything resembling
//! production.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::breaker::CircuitBreaker;
use crate::clock::Clock;

/// Handle to a spawned periodic-reset task.
///
/// The task runs until [`shutdown`](Self::shutdown) is called or the
/// handle is dropped.
#[derive(Debug)]
pub struct ResetScheduler {
    interval: Duration,
    handle: JoinHandle<()>,
}

impl ResetScheduler {
    /// Spawn a task that force-resets `breaker` every `interval`.
    ///
    /// Must be called from within a tokio runtime. Missed ticks are
    /// skipped rather than bursted. The reset goes through the same
    /// mutual-exclusion domain as `try_acquire`/`record_outcome`, so
    /// it never races an in-flight bookkeeping pair.
    pub fn spawn<C: Clock>(breaker: CircuitBreaker<C>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so
            // resets start one full interval after spawn
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!(interval_ms = interval.as_millis() as u64, "Periodic forced reset");
                breaker.force_reset();
            }
        });

        Self { interval, handle }
    }

    /// The configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the reset task.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for ResetScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
