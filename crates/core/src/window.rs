//! Count-based sliding window over call outcomes.
//!
//! Records the last N outcomes (success/failure) and derives a failure
//! rate once enough calls have been observed. Pure bookkeeping, no
//! I/O, no error conditions; serialization of access is the breaker's
//! responsibility.

use std::collections::VecDeque;

/// Ring buffer of the most recent call outcomes (`true` = success).
///
/// The failure rate is only considered statistically valid once
/// `min_calls` outcomes have been recorded; before that
/// [`failure_rate`](Self::failure_rate) reports insufficient data and
/// the breaker never opens from this window alone.
#[derive(Debug, Clone)]
pub struct SlidingOutcomeWindow {
    capacity: usize,
    min_calls: usize,
    outcomes: VecDeque<bool>,
}

impl SlidingOutcomeWindow {
    /// Create a window holding at most `capacity` outcomes, evaluating
    /// the failure rate once `min_calls` have been recorded.
    ///
    /// `min_calls` is clamped to `capacity`: a minimum larger than the
    /// window could never be reached.
    pub fn new(capacity: usize, min_calls: usize) -> Self {
        let min_calls = min_calls.min(capacity).max(1);
        Self { capacity, min_calls, outcomes: VecDeque::with_capacity(capacity) }
    }

    /// Append an outcome, evicting the oldest if at capacity. O(1).
    pub fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    /// Failure rate as a percentage (0-100) over the recorded outcomes,
    /// or `None` while fewer than `min_calls` have been observed.
    pub fn failure_rate(&self) -> Option<f64> {
        if self.outcomes.len() < self.min_calls {
            return None;
        }
        let failures = self.outcomes.iter().filter(|success| !**success).count();
        Some(failures as f64 * 100.0 / self.outcomes.len() as f64)
    }

    /// Clear all recorded outcomes.
    pub fn reset(&mut self) {
        self.outcomes.clear();
    }

    /// Number of outcomes currently recorded.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no outcomes have been recorded.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Fixed capacity of the window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Minimum recorded calls before the failure rate is evaluated.
    pub fn min_calls(&self) -> usize {
        self.min_calls
    }
}
