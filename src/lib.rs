//! Outbound URL-fetch gateway library.
//!
//! Validates client-supplied URLs against an ordered SSRF-defense pipeline,
//! fetches approved targets under a restrictive guard, and relays the bytes.

pub mod config;
pub mod fetch;
pub mod http;
pub mod observability;
pub mod security;
pub mod validate;

pub use config::GatewayConfig;
pub use http::{AppState, GatewayServer};
pub use validate::{Cleared, Denial, DenyCode, UrlValidator};
