//! Keyed limiter registry: per-key bucket ownership and idle eviction.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::config::RegistryConfig;
use crate::error::Result;

use super::bucket::TokenBucket;

/// Per-key registry state. Owned exclusively by the registry's map.
struct RegistryEntry {
    bucket: TokenBucket,
    last_access: Instant,
}

/// The registry that owns one token bucket per observed key.
///
/// Buckets are constructed lazily on first use — exactly once even under
/// concurrent first use, via the map's atomic entry API — and evicted once
/// idle for longer than the configured window. All keys share one configured
/// rate; unrelated keys never contend beyond their map shard.
///
/// This struct is thread-safe and is shared across tasks behind an [`Arc`].
pub struct KeyedLimiterRegistry<C: Clock = MonotonicClock> {
    /// Token buckets indexed by caller key
    entries: DashMap<String, RegistryEntry>,
    config: RegistryConfig,
    clock: C,
    /// Total number of buckets ever constructed
    created_total: AtomicU64,
    /// Origin for the sweep timestamp below
    started: Instant,
    /// Milliseconds since `started` at which the last sweep ran
    last_sweep_ms: AtomicU64,
}

impl KeyedLimiterRegistry<MonotonicClock> {
    /// Create a registry on the system monotonic clock.
    ///
    /// Fails if the configuration is invalid; configuration errors are fatal
    /// at construction, never surfaced per-call.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::with_clock(config, MonotonicClock)
    }
}

impl<C: Clock> KeyedLimiterRegistry<C> {
    /// Create a registry with an explicit clock.
    pub fn with_clock(config: RegistryConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let started = clock.now();
        Ok(Self {
            entries: DashMap::new(),
            config,
            clock,
            created_total: AtomicU64::new(0),
            started,
            last_sweep_ms: AtomicU64::new(0),
        })
    }

    /// Check the rate limit for a key, creating its bucket on first use.
    ///
    /// Returns `true` if the request is admitted (one token debited),
    /// `false` if it should be throttled. Never blocks on anything beyond
    /// the key's map shard.
    pub fn acquire(&self, key: &str) -> bool {
        let now = self.clock.now();

        // Sweep before taking any entry guard: the sweep needs the shard
        // locks, so running it while holding one would deadlock.
        self.maybe_sweep(now);

        trace!(key, "Checking rate limit");

        // Fast path avoids allocating the key for already-known callers.
        if let Some(mut entry) = self.entries.get_mut(key) {
            return Self::admit(&mut entry, now);
        }

        // Atomic compute-if-absent: under concurrent first use of one key,
        // a single insert wins and every caller sees the same bucket.
        let mut entry = self.entries.entry(key.to_owned()).or_insert_with(|| {
            self.created_total.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Creating rate limiter for new key");
            RegistryEntry {
                bucket: TokenBucket::new(
                    self.config.burst_capacity,
                    self.config.refill_rate_per_second(),
                    now,
                ),
                last_access: now,
            }
        });
        Self::admit(&mut entry, now)
    }

    /// Refill+debit under the exclusive shard guard, then mark the entry
    /// accessed before the guard drops so a concurrent sweep can never
    /// reap an entry that was just used.
    fn admit(entry: &mut RegistryEntry, now: Instant) -> bool {
        let admitted = entry.bucket.try_acquire(now);
        entry.last_access = now;
        admitted
    }

    /// Remove entries idle for longer than the configured window.
    ///
    /// Returns the number of entries removed. Removal takes the same shard
    /// locks as `acquire`, so a bucket is never mutated after removal.
    pub fn evict_idle(&self) -> usize {
        self.sweep(self.clock.now())
    }

    /// Spawn a periodic eviction sweep on the tokio runtime.
    ///
    /// The task runs until the returned handle is aborted or dropped along
    /// with the runtime.
    pub fn start_sweeper(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()>
    where
        C: 'static,
    {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.evict_idle();
            }
        })
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the number of live entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get the total number of buckets ever constructed.
    pub fn created_total(&self) -> u64 {
        self.created_total.load(Ordering::Relaxed)
    }

    /// Drop all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Run at most one sweep per idle window, elected by compare-and-swap
    /// so concurrent callers never pile onto the shard locks together.
    fn maybe_sweep(&self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.started).as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if elapsed_ms.saturating_sub(last) < self.config.idle_eviction_window_ms {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, elapsed_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep(now);
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let window = self.config.idle_eviction_window();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= window);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(
                removed,
                remaining = self.entries.len(),
                "Evicted idle rate limiters"
            );
        }
        removed
    }
}
