//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the fetch gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// URL validation policy.
    pub policy: PolicyConfig,

    /// Outbound fetch limits.
    pub fetch: FetchConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// URL validation policy.
///
/// Every field is independently overridable; the defaults describe an image
/// proxy that only reaches public HTTP(S) origins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// URL schemes the gateway will fetch. Only "http" and "https" are
    /// accepted here; config validation rejects anything else.
    pub allowed_schemes: Vec<String>,

    /// Hostnames denied outright, matched exactly or as a suffix
    /// (".<blocked>").
    pub blocked_hostnames: Vec<String>,

    /// Ports a target URL may name explicitly.
    pub allowed_ports: Vec<u16>,

    /// Ports internal/protected services listen on. Must not intersect
    /// `allowed_ports`; checked at load time, not at request time.
    pub protected_ports: Vec<u16>,

    /// Extensions the decoded URL path must end with (case-insensitive).
    pub allowed_path_extensions: Vec<String>,

    /// Content types the upstream response may declare.
    pub allowed_content_types: Vec<String>,

    /// Extra reserved CIDR ranges beyond the built-in table, e.g. container
    /// network subnets ("172.18.0.0/16").
    pub blocked_ranges: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            blocked_hostnames: vec![
                "localhost".to_string(),
                "internal-app".to_string(),
                "internal".to_string(),
                "admin".to_string(),
                "metadata".to_string(),
                "metadata.google.internal".to_string(),
                "instance-data".to_string(),
            ],
            allowed_ports: vec![80, 443, 8080, 8443],
            protected_ports: Vec::new(),
            allowed_path_extensions: vec![
                ".png".to_string(),
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".gif".to_string(),
                ".webp".to_string(),
                ".svg".to_string(),
            ],
            allowed_content_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
                "image/svg+xml".to_string(),
            ],
            blocked_ranges: Vec::new(),
        }
    }
}

/// Outbound fetch limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Wall-clock timeout for the upstream request in seconds.
    pub timeout_secs: u64,

    /// Maximum response body size in bytes. Enforced against the declared
    /// Content-Length and again while streaming the body.
    pub max_response_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            max_response_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client within the window.
    pub max_requests: u32,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Trust the X-Forwarded-For header for client identity. Only set this
    /// behind a reverse proxy that strips or rewrites the header; otherwise
    /// the peer address is used.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
