//! Public throttling entry point.

use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, MonotonicClock};
use crate::config::RegistryConfig;
use crate::error::{FloodgateError, Result};

use super::registry::KeyedLimiterRegistry;

/// The boolean-returning facade callers use to throttle requests.
///
/// The facade owns (or shares) a [`KeyedLimiterRegistry`] passed in at
/// construction; it is an explicit dependency of whichever service needs
/// throttling, never process-global state.
pub struct RateLimitFacade<C: Clock = MonotonicClock> {
    registry: Arc<KeyedLimiterRegistry<C>>,
}

impl RateLimitFacade<MonotonicClock> {
    /// Create a facade over a fresh registry on the system clock.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Ok(Self {
            registry: Arc::new(KeyedLimiterRegistry::new(config)?),
        })
    }
}

impl<C: Clock> RateLimitFacade<C> {
    /// Create a facade over a shared registry.
    pub fn with_registry(registry: Arc<KeyedLimiterRegistry<C>>) -> Self {
        Self { registry }
    }

    /// Decide whether the request for `key` should be throttled.
    ///
    /// Returns `Ok(true)` when the request must be **rejected** and
    /// `Ok(false)` when it is admitted — the inverse of token acquisition.
    /// An empty key is an error and never reaches the registry.
    pub fn rate_limit_request(&self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Err(FloodgateError::EmptyKey);
        }

        let admitted = self.registry.acquire(key);
        if !admitted {
            debug!(key, "Request throttled");
        }
        Ok(!admitted)
    }

    /// The configured requests-per-minute ceiling.
    pub fn max_allowed_rate(&self) -> f64 {
        self.registry.config().max_requests_per_minute
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &Arc<KeyedLimiterRegistry<C>> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn manual_facade(config: RegistryConfig) -> (RateLimitFacade<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let registry =
            Arc::new(KeyedLimiterRegistry::with_clock(config, clock.clone()).unwrap());
        (RateLimitFacade::with_registry(registry), clock)
    }

    #[test]
    fn test_empty_key_fails_fast_without_creating_a_bucket() {
        let facade = RateLimitFacade::new(RegistryConfig::default()).unwrap();

        let err = facade.rate_limit_request("").unwrap_err();
        assert!(matches!(err, FloodgateError::EmptyKey));
        assert_eq!(facade.registry().entry_count(), 0);
    }

    #[test]
    fn test_true_means_throttled() {
        let (facade, _clock) = manual_facade(RegistryConfig::default());

        // Default burst is one token: first call admitted, second rejected
        assert_eq!(facade.rate_limit_request("account-1").unwrap(), false);
        assert_eq!(facade.rate_limit_request("account-1").unwrap(), true);
    }

    #[test]
    fn test_single_token_refills_every_three_seconds() {
        // 20 requests/minute, capacity 1, key "X":
        // t=0 admitted, t=0.5s denied, t=3.1s admitted.
        let (facade, clock) = manual_facade(RegistryConfig::default());

        assert!(!facade.rate_limit_request("X").unwrap());

        clock.advance(Duration::from_millis(500));
        assert!(facade.rate_limit_request("X").unwrap());

        clock.advance(Duration::from_millis(2_600));
        assert!(!facade.rate_limit_request("X").unwrap());
    }

    #[test]
    fn test_max_allowed_rate_reports_configured_ceiling() {
        let facade = RateLimitFacade::new(RegistryConfig {
            max_requests_per_minute: 90.0,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(facade.max_allowed_rate(), 90.0);
    }

    #[test]
    fn test_throttling_one_key_leaves_others_alone() {
        let (facade, _clock) = manual_facade(RegistryConfig::default());

        assert!(!facade.rate_limit_request("loud").unwrap());
        assert!(facade.rate_limit_request("loud").unwrap());

        assert!(!facade.rate_limit_request("quiet").unwrap());
    }
}
