//! Token bucket state and refill arithmetic.

use std::time::{Duration, Instant};

/// A token bucket that refills lazily on access.
///
/// Tokens accumulate at `refill_rate_per_sec` up to `capacity`; each admitted
/// request consumes one token. Refill is computed on demand from the elapsed
/// time since the last refill, so maintaining many buckets costs nothing
/// while they sit idle.
///
/// The bucket is not internally synchronized; the registry holds it behind
/// an exclusive guard for the duration of every refill+debit.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold
    capacity: f64,
    /// Current token balance, always within `0.0..=capacity`
    tokens: f64,
    /// Tokens added per second of elapsed time
    refill_rate_per_sec: f64,
    /// When the bucket was last refilled; never moves backward
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: f64, refill_rate_per_sec: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate_per_sec,
            last_refill: now,
        }
    }

    /// Refill from elapsed time, then try to consume one token.
    ///
    /// Returns `true` and debits exactly one token if one is available;
    /// returns `false` otherwise with no state change beyond the refill.
    /// Never blocks and never fails.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token balance.
    pub fn available(&self) -> f64 {
        self.tokens
    }

    /// Maximum tokens the bucket can hold.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self, now: Instant) {
        // A clock reading at or before the last refill grants nothing;
        // saturating_duration_since clamps skew to zero elapsed time.
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > Duration::ZERO {
            let refilled = self.tokens + elapsed.as_secs_f64() * self.refill_rate_per_sec;
            self.tokens = refilled.min(self.capacity);
            self.last_refill = now;
        }
    }
}
