//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce the port-consistency invariant: allowed ports must not
//!   intersect protected internal service ports
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that extra blocked ranges parse as CIDR networks
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use ipnet::IpNet;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Config field the error refers to.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let policy = &config.policy;

    if policy.allowed_schemes.is_empty() {
        errors.push(ValidationError {
            field: "policy.allowed_schemes",
            message: "must not be empty".to_string(),
        });
    }
    for scheme in &policy.allowed_schemes {
        if scheme != "http" && scheme != "https" {
            errors.push(ValidationError {
                field: "policy.allowed_schemes",
                message: format!("'{}' is not a fetchable scheme (http/https only)", scheme),
            });
        }
    }

    if policy.allowed_ports.is_empty() {
        errors.push(ValidationError {
            field: "policy.allowed_ports",
            message: "must not be empty".to_string(),
        });
    }

    // Port-consistency invariant: an allowed port that a protected internal
    // service listens on is an SSRF hole, rejected at startup.
    let conflicting: Vec<u16> = policy
        .allowed_ports
        .iter()
        .filter(|p| policy.protected_ports.contains(p))
        .copied()
        .collect();
    if !conflicting.is_empty() {
        errors.push(ValidationError {
            field: "policy.allowed_ports",
            message: format!(
                "ports {:?} are both allowed and protected; remove them from one list",
                conflicting
            ),
        });
    }

    if policy.allowed_path_extensions.is_empty() {
        errors.push(ValidationError {
            field: "policy.allowed_path_extensions",
            message: "must not be empty".to_string(),
        });
    }
    for ext in &policy.allowed_path_extensions {
        if !ext.starts_with('.') {
            errors.push(ValidationError {
                field: "policy.allowed_path_extensions",
                message: format!("'{}' must start with '.'", ext),
            });
        }
    }

    if policy.allowed_content_types.is_empty() {
        errors.push(ValidationError {
            field: "policy.allowed_content_types",
            message: "must not be empty".to_string(),
        });
    }
    for ct in &policy.allowed_content_types {
        if !ct.contains('/') {
            errors.push(ValidationError {
                field: "policy.allowed_content_types",
                message: format!("'{}' is not a media type", ct),
            });
        }
    }

    for range in &policy.blocked_ranges {
        if range.parse::<IpNet>().is_err() {
            errors.push(ValidationError {
                field: "policy.blocked_ranges",
                message: format!("'{}' is not a valid CIDR network", range),
            });
        }
    }

    if config.fetch.timeout_secs == 0 {
        errors.push(ValidationError {
            field: "fetch.timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.fetch.max_response_bytes == 0 {
        errors.push(ValidationError {
            field: "fetch.max_response_bytes",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError {
                field: "rate_limit.max_requests",
                message: "must be greater than zero when rate limiting is enabled".to_string(),
            });
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError {
                field: "rate_limit.window_secs",
                message: "must be greater than zero when rate limiting is enabled".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
