//! Time sources for the rate limiter.
//!
//! Refill arithmetic depends on elapsed time, so the clock is abstracted
//! behind a trait: production code uses the system monotonic clock, tests
//! drive a manually advanced one for deterministic timing.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of monotonic time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The system monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually driven clock for tests.
///
/// Clones share the same underlying instant, so a clock handed to a
/// registry can still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock pinned to the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }

    /// Move the clock backward, simulating skew.
    ///
    /// Saturates at the instant the process observed first if the rewind
    /// would underflow.
    pub fn rewind(&self, duration: Duration) {
        let mut now = self.now.lock();
        if let Some(earlier) = now.checked_sub(duration) {
            *now = earlier;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
