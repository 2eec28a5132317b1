//! URL validation subsystem.
//!
//! # Data Flow
//! ```text
//! raw url string
//!     → url.rs (parse & normalize; failure is a terminal deny)
//!     → rules.rs (ordered checks, cheap syntactic first)
//!     → resolver.rs (DNS, lazily before the first rule that needs it)
//!     → Cleared (allow + resolved addresses) or Denial (code + reason)
//! ```
//!
//! # Design Decisions
//! - Short-circuit on the first deny; every denial names exactly one rule
//! - Resolution failure denies; absence of information is never permission
//! - The validator holds no mutable state, so verdicts cannot be cached
//!   between requests by accident

pub mod address;
pub mod resolver;
pub mod rules;
pub mod url;

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::PolicyConfig;
use crate::validate::address::AddressClassifier;
use crate::validate::resolver::HostResolver;
use crate::validate::rules::{
    HostnameBlacklistRule, LiteralIpRule, PathExtensionRule, PortRule, ResolvedIpRule, SchemeRule,
    ValidationRule,
};
use crate::validate::url::CandidateUrl;

/// Stable machine-readable denial codes, one per way a URL can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyCode {
    InvalidUrl,
    SchemeNotAllowed,
    HostnameBlacklisted,
    PrivateIpLiteral,
    ResolutionFailed,
    ResolvesToPrivateIp,
    PortNotAllowed,
    PathExtensionNotAllowed,
}

impl DenyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyCode::InvalidUrl => "invalid-url",
            DenyCode::SchemeNotAllowed => "scheme-not-allowed",
            DenyCode::HostnameBlacklisted => "hostname-blacklisted",
            DenyCode::PrivateIpLiteral => "private-ip-literal",
            DenyCode::ResolutionFailed => "resolution-failed",
            DenyCode::ResolvesToPrivateIp => "resolves-to-private-ip",
            DenyCode::PortNotAllowed => "port-not-allowed",
            DenyCode::PathExtensionNotAllowed => "path-extension-not-allowed",
        }
    }
}

/// A denial: stable code plus a human-auditable reason. Never partially
/// populated.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Denial {
    pub code: DenyCode,
    pub message: String,
}

/// Outcome of a single rule.
#[derive(Debug)]
pub enum Verdict {
    Allow,
    Deny(Denial),
}

impl Verdict {
    pub fn deny(code: DenyCode, message: String) -> Self {
        Verdict::Deny(Denial { code, message })
    }
}

/// A URL the full pipeline has cleared, with the addresses the decision was
/// based on so the fetch can pin one instead of resolving again.
#[derive(Debug, Clone)]
pub struct Cleared {
    pub url: CandidateUrl,
    pub resolved: Vec<IpAddr>,
}

impl Cleared {
    /// The address the fetch should connect to.
    pub fn primary_addr(&self) -> Option<IpAddr> {
        self.resolved.first().copied()
    }
}

/// The ordered validation pipeline.
pub struct UrlValidator {
    rules: Vec<Box<dyn ValidationRule>>,
    resolver: Arc<dyn HostResolver>,
}

impl UrlValidator {
    /// Build the standard pipeline from policy configuration. Order
    /// matters: cheap syntactic checks first, the network check last among
    /// the address checks.
    pub fn from_config(
        policy: &PolicyConfig,
        classifier: Arc<AddressClassifier>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        let rules: Vec<Box<dyn ValidationRule>> = vec![
            Box::new(SchemeRule::new(policy.allowed_schemes.clone())),
            Box::new(HostnameBlacklistRule::new(policy.blocked_hostnames.clone())),
            Box::new(LiteralIpRule::new(classifier.clone())),
            Box::new(ResolvedIpRule::new(classifier)),
            Box::new(PortRule::new(policy.allowed_ports.clone())),
            Box::new(PathExtensionRule::new(
                policy.allowed_path_extensions.clone(),
            )),
        ];
        Self::new(rules, resolver)
    }

    /// Build a pipeline from an explicit rule list. The list order is the
    /// evaluation order.
    pub fn new(rules: Vec<Box<dyn ValidationRule>>, resolver: Arc<dyn HostResolver>) -> Self {
        Self { rules, resolver }
    }

    /// Run the pipeline, short-circuiting on the first deny.
    pub async fn validate(&self, raw: &str) -> Result<Cleared, Denial> {
        let url = CandidateUrl::parse(raw).map_err(|e| Denial {
            code: DenyCode::InvalidUrl,
            message: format!("invalid URL: {}", e),
        })?;

        let mut resolved: Option<Vec<IpAddr>> = None;

        for rule in &self.rules {
            if rule.needs_resolution() && resolved.is_none() {
                resolved = Some(self.resolve(&url).await?);
            }

            if let Verdict::Deny(denial) = rule.evaluate(&url, resolved.as_deref()) {
                tracing::debug!(
                    rule = rule.name(),
                    code = denial.code.as_str(),
                    host = url.host_str(),
                    "URL denied"
                );
                return Err(denial);
            }
        }

        Ok(Cleared {
            resolved: resolved.unwrap_or_default(),
            url,
        })
    }

    async fn resolve(&self, url: &CandidateUrl) -> Result<Vec<IpAddr>, Denial> {
        // A literal host is its own resolution.
        if let Some(ip) = url.literal_ip() {
            return Ok(vec![ip]);
        }

        self.resolver
            .resolve(url.host_str())
            .await
            .map_err(|e| Denial {
                code: DenyCode::ResolutionFailed,
                message: format!("could not resolve '{}': {}", url.host_str(), e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::resolver::ResolveError;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::collections::HashMap;

    /// Scripted resolver: known hosts resolve to fixed addresses, everything
    /// else fails the lookup.
    struct FakeResolver {
        hosts: HashMap<String, Vec<IpAddr>>,
    }

    impl FakeResolver {
        fn new(entries: &[(&str, &[&str])]) -> Arc<Self> {
            let hosts = entries
                .iter()
                .map(|(host, ips)| {
                    (
                        host.to_string(),
                        ips.iter().map(|ip| ip.parse().unwrap()).collect(),
                    )
                })
                .collect();
            Arc::new(Self { hosts })
        }
    }

    impl HostResolver for FakeResolver {
        fn resolve<'a>(
            &'a self,
            host: &'a str,
        ) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>> {
            async move {
                self.hosts
                    .get(host)
                    .cloned()
                    .ok_or_else(|| ResolveError::Lookup {
                        host: host.to_string(),
                        message: "name not found".to_string(),
                    })
            }
            .boxed()
        }
    }

    fn validator(resolver: Arc<dyn HostResolver>) -> UrlValidator {
        UrlValidator::from_config(
            &PolicyConfig::default(),
            Arc::new(AddressClassifier::default()),
            resolver,
        )
    }

    fn public_resolver() -> Arc<FakeResolver> {
        FakeResolver::new(&[("example.com", &["93.184.216.34"])])
    }

    #[tokio::test]
    async fn test_allow_path() {
        let v = validator(public_resolver());
        let cleared = v.validate("http://example.com/photo.png").await.unwrap();
        assert_eq!(cleared.primary_addr(), Some("93.184.216.34".parse().unwrap()));
        assert_eq!(cleared.url.host_str(), "example.com");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let v = validator(public_resolver());
        let denial = v.validate("not a url at all").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::InvalidUrl);
    }

    #[tokio::test]
    async fn test_scheme_denied_regardless_of_hostname() {
        let v = validator(public_resolver());
        for raw in ["gopher://example.com/x.png", "file://server/share.png"] {
            let denial = v.validate(raw).await.unwrap_err();
            assert_eq!(denial.code, DenyCode::SchemeNotAllowed, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_blacklisted_hostname_and_subdomains() {
        let v = validator(public_resolver());
        for raw in [
            "http://localhost/a.png",
            "http://foo.localhost/a.png",
            "http://metadata.google.internal/a.png",
        ] {
            let denial = v.validate(raw).await.unwrap_err();
            assert_eq!(denial.code, DenyCode::HostnameBlacklisted, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_private_literal_denied_without_resolution() {
        // Empty resolver: if the pipeline tried to resolve, it would deny
        // with resolution-failed instead of the literal-IP code.
        let v = validator(FakeResolver::new(&[]));
        let denial = v.validate("http://169.254.169.254/a.png").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::PrivateIpLiteral);
        assert!(denial.message.contains("private"));
    }

    #[tokio::test]
    async fn test_encoded_literals_denied() {
        let v = validator(FakeResolver::new(&[]));
        for raw in [
            "http://2130706433/a.png",
            "http://0x7f000001/a.png",
            "http://0177.0.0.1/a.png",
            "http://127.1/a.png",
            "http://[::1]/a.png",
        ] {
            let denial = v.validate(raw).await.unwrap_err();
            assert_eq!(denial.code, DenyCode::PrivateIpLiteral, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_resolution_failure_is_denied() {
        let v = validator(FakeResolver::new(&[]));
        let denial = v.validate("http://unknown.example.org/a.png").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::ResolutionFailed);
    }

    #[tokio::test]
    async fn test_resolves_to_private_denied_for_non_numeric_hostname() {
        let v = validator(FakeResolver::new(&[(
            "evil.example.org",
            &["93.184.216.34", "172.17.0.2"],
        )]));
        let denial = v.validate("http://evil.example.org/a.png").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::ResolvesToPrivateIp);
        assert!(denial.message.contains("172.17.0.2"));
    }

    #[tokio::test]
    async fn test_disallowed_port_denied() {
        let v = validator(public_resolver());
        let denial = v.validate("http://example.com:22/a.png").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::PortNotAllowed);
    }

    #[tokio::test]
    async fn test_disallowed_extension_denied() {
        let v = validator(public_resolver());
        let denial = v.validate("http://example.com/admin/secrets").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::PathExtensionNotAllowed);
    }

    #[tokio::test]
    async fn test_first_deny_wins() {
        // Blacklisted hostname AND bad extension: the earlier rule decides.
        let v = validator(public_resolver());
        let denial = v.validate("http://localhost/admin/secrets").await.unwrap_err();
        assert_eq!(denial.code, DenyCode::HostnameBlacklisted);
    }

    #[tokio::test]
    async fn test_repeated_validation_is_idempotent() {
        let v = validator(public_resolver());
        let first = v.validate("http://example.com/photo.png").await.unwrap();
        let second = v.validate("http://example.com/photo.png").await.unwrap();
        assert_eq!(first.resolved, second.resolved);
        assert_eq!(first.url.as_str(), second.url.as_str());
    }
}
