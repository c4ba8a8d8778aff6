//! Tollgate - In-Process Token Bucket Rate Limiting
//!
//! This crate implements a per-key token bucket rate limiter with named,
//! configurable policies. Buckets refill continuously over time, admit bursts
//! up to their capacity, and report an advisory retry delay on rejection.
//! The limiter is synchronous and in-memory, and safe to call from concurrent
//! request-handling contexts.

pub mod bucket;
pub mod clock;
pub mod error;
pub mod key;
pub mod limiter;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TollgateError};
pub use limiter::{Decision, RateLimiter};
pub use policy::{Policy, PolicySet};
