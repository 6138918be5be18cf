//! Floodgate - Keyed Rate Limiting
//!
//! This crate implements an in-process, keyed token-bucket rate limiter:
//! each caller identity ("key") gets its own lazily constructed bucket,
//! idle buckets are evicted to bound memory, and admission decisions are
//! instantaneous accept/reject with no blocking or queueing.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
