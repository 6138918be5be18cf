//! Rate limiting logic and state management.

mod bucket;
mod facade;
mod registry;

pub use bucket::TokenBucket;
pub use facade::RateLimitFacade;
pub use registry::KeyedLimiterRegistry;
