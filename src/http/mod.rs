//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, rate-limit middleware, /fetch handler)
//!     → validate (pipeline verdict)
//!     → fetch (guarded relay)
//!     → response.rs (structured errors, relayed bodies)
//! ```

pub mod response;
pub mod server;

pub use server::{AppState, GatewayServer};
