//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! Cleared (validated URL + pinned address)
//!     → guard.rs (no-redirect request, timeout, size cutoff,
//!                 content-type verification)
//!     → FetchedBody (relayable) or FetchError (403 policy / 500 upstream)
//! ```

pub mod guard;

pub use guard::{FetchError, FetchGuard, FetchedBody};
