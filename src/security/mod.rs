//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (pick the rate-limit key: peer address, or
//!       X-Forwarded-For when explicitly trusted)
//!     → rate_limit.rs (per-key sliding window check)
//!     → Pass to the fetch handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: admission control runs before any validation work
//! - No trust in client input: forwarded headers require opt-in

pub mod identity;
pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter, RateLimiterState};
