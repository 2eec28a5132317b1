//! Client identity extraction for admission control.
//!
//! The identity a rate limit keys on is a trust decision. The connection's
//! peer address is the only thing the client cannot choose; X-Forwarded-For
//! is honored solely when configuration says a trusted reverse proxy in
//! front of us rewrites it.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// The rate-limit key for a request.
pub fn client_key(trust_forwarded_for: bool, headers: &HeaderMap, peer: SocketAddr) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            // First hop in the chain is the original client.
            let first = forwarded.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.ip().to_string()
}
