//! Validation rules.
//!
//! # Responsibilities
//! - One rule per independent SSRF check
//! - Each rule evaluates a candidate URL (plus resolved addresses where
//!   needed) to a verdict
//!
//! # Design Decisions
//! - Rules are trait objects so the pipeline is an ordered list that can be
//!   extended without touching the driver
//! - Rule order is the pipeline's concern; a rule only assumes the URL
//!   parsed successfully
//! - Cheap syntactic rules carry no state beyond their configured sets

use std::net::IpAddr;
use std::sync::Arc;

use crate::validate::address::AddressClassifier;
use crate::validate::url::CandidateUrl;
use crate::validate::{DenyCode, Verdict};

/// A single check in the validation pipeline.
pub trait ValidationRule: Send + Sync {
    /// Stable rule name for logs and audit.
    fn name(&self) -> &'static str;

    /// Whether this rule needs the hostname's resolved addresses.
    fn needs_resolution(&self) -> bool {
        false
    }

    /// Evaluate the candidate. `resolved` is `Some` for rules that declared
    /// `needs_resolution` once the pipeline has resolved the hostname.
    fn evaluate(&self, url: &CandidateUrl, resolved: Option<&[IpAddr]>) -> Verdict;
}

/// Scheme must be in the allowed set.
pub struct SchemeRule {
    allowed: Vec<String>,
}

impl SchemeRule {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

impl ValidationRule for SchemeRule {
    fn name(&self) -> &'static str {
        "scheme"
    }

    fn evaluate(&self, url: &CandidateUrl, _resolved: Option<&[IpAddr]>) -> Verdict {
        if self.allowed.iter().any(|s| s == url.scheme()) {
            Verdict::Allow
        } else {
            Verdict::deny(
                DenyCode::SchemeNotAllowed,
                format!("scheme '{}' is not allowed", url.scheme()),
            )
        }
    }
}

/// Hostname must not match the blacklist, exactly or as a subdomain.
pub struct HostnameBlacklistRule {
    blocked: Vec<String>,
}

impl HostnameBlacklistRule {
    pub fn new(blocked: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked: blocked.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

impl ValidationRule for HostnameBlacklistRule {
    fn name(&self) -> &'static str {
        "hostname-blacklist"
    }

    fn evaluate(&self, url: &CandidateUrl, _resolved: Option<&[IpAddr]>) -> Verdict {
        let host = url.host_str();
        for blocked in &self.blocked {
            if host == blocked || host.ends_with(&format!(".{}", blocked)) {
                return Verdict::deny(
                    DenyCode::HostnameBlacklisted,
                    format!("hostname '{}' is blacklisted", host),
                );
            }
        }
        Verdict::Allow
    }
}

/// A hostname that is itself a numeric address must not be private.
pub struct LiteralIpRule {
    classifier: Arc<AddressClassifier>,
}

impl LiteralIpRule {
    pub fn new(classifier: Arc<AddressClassifier>) -> Self {
        Self { classifier }
    }
}

impl ValidationRule for LiteralIpRule {
    fn name(&self) -> &'static str {
        "literal-ip"
    }

    fn evaluate(&self, url: &CandidateUrl, _resolved: Option<&[IpAddr]>) -> Verdict {
        if let Some(ip) = url.literal_ip() {
            if let Some(reason) = self.classifier.classify(ip) {
                return Verdict::deny(
                    DenyCode::PrivateIpLiteral,
                    format!("host '{}' is a private address ({})", url.host_str(), reason),
                );
            }
        }
        Verdict::Allow
    }
}

/// No resolved address may be private. Any single hit is a leak.
pub struct ResolvedIpRule {
    classifier: Arc<AddressClassifier>,
}

impl ResolvedIpRule {
    pub fn new(classifier: Arc<AddressClassifier>) -> Self {
        Self { classifier }
    }
}

impl ValidationRule for ResolvedIpRule {
    fn name(&self) -> &'static str {
        "resolved-ip"
    }

    fn needs_resolution(&self) -> bool {
        true
    }

    fn evaluate(&self, url: &CandidateUrl, resolved: Option<&[IpAddr]>) -> Verdict {
        let Some(addrs) = resolved else {
            // Fail closed if the pipeline ever hands us nothing.
            return Verdict::deny(
                DenyCode::ResolutionFailed,
                format!("could not resolve '{}'", url.host_str()),
            );
        };

        for ip in addrs {
            if let Some(reason) = self.classifier.classify(*ip) {
                return Verdict::deny(
                    DenyCode::ResolvesToPrivateIp,
                    format!(
                        "'{}' resolves to private address {} ({})",
                        url.host_str(),
                        ip,
                        reason
                    ),
                );
            }
        }
        Verdict::Allow
    }
}

/// An explicit port must be in the allowed set.
pub struct PortRule {
    allowed: Vec<u16>,
}

impl PortRule {
    pub fn new(allowed: impl IntoIterator<Item = u16>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl ValidationRule for PortRule {
    fn name(&self) -> &'static str {
        "port"
    }

    fn evaluate(&self, url: &CandidateUrl, _resolved: Option<&[IpAddr]>) -> Verdict {
        match url.explicit_port() {
            Some(port) if !self.allowed.contains(&port) => Verdict::deny(
                DenyCode::PortNotAllowed,
                format!("port {} is not allowed", port),
            ),
            _ => Verdict::Allow,
        }
    }
}

/// The decoded path must end with an allowed extension. This gates the
/// request's shape; the response content type is verified after the fetch.
pub struct PathExtensionRule {
    allowed: Vec<String>,
}

impl PathExtensionRule {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

impl ValidationRule for PathExtensionRule {
    fn name(&self) -> &'static str {
        "path-extension"
    }

    fn evaluate(&self, url: &CandidateUrl, _resolved: Option<&[IpAddr]>) -> Verdict {
        let path = url.decoded_path().to_lowercase();
        if self.allowed.iter().any(|ext| path.ends_with(ext)) {
            Verdict::Allow
        } else {
            Verdict::deny(
                DenyCode::PathExtensionNotAllowed,
                "URL path must end with an allowed file extension".to_string(),
            )
        }
    }
}
