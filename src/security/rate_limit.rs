//! Rate limiting middleware with per-client sliding windows.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::security::identity::client_key;

/// Sweep the whole table roughly once per this many checks.
const SWEEP_INTERVAL: u64 = 1024;

/// A sliding-window request counter keyed by client identity.
///
/// Each key's timestamp vector is pruned and updated under that key's shard
/// lock, so concurrent requests from the same client serialize on the
/// check and cannot double-spend the window.
pub struct RateLimiter {
    log: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    window: Duration,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            log: DashMap::new(),
            max_requests: max_requests as usize,
            window,
            checks: AtomicU64::new(0),
        }
    }

    /// Record an attempt for `key`. Returns false when the client has used
    /// up its window.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();

        let allowed = {
            let mut stamps = self.log.entry(key.to_string()).or_default();
            stamps.retain(|t| now.duration_since(*t) < self.window);
            if stamps.len() < self.max_requests {
                stamps.push(now);
                true
            } else {
                false
            }
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now);
        }

        allowed
    }

    /// Drop keys whose windows have fully expired so the table stays
    /// bounded by the set of recently active clients.
    fn sweep(&self, now: Instant) {
        self.log
            .retain(|_, stamps| stamps.iter().any(|t| now.duration_since(*t) < self.window));
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.log.len()
    }
}

/// State for the rate limiting middleware.
pub struct RateLimiterState {
    pub limiter: RateLimiter,
    pub enabled: bool,
    pub trust_forwarded_for: bool,
}

impl RateLimiterState {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(
                config.max_requests,
                Duration::from_secs(config.window_secs),
            ),
            enabled: config.enabled,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

/// Middleware enforcing the per-client request budget before any
/// validation work happens.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.enabled {
        return next.run(request).await;
    }

    let key = client_key(state.trust_forwarded_for, request.headers(), addr);

    if state.limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate-limited",
            "Rate limit exceeded. Try again later.",
        )
    }
}
