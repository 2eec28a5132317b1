//! Reserved-address classification.
//!
//! # Responsibilities
//! - Hold the reserved/private range table as data, auditable and testable
//! - Classify numeric addresses against the complete table
//! - Fail closed: malformed address input classifies as private
//!
//! # Design Decisions
//! - Ranges are CIDR data, not inline predicates, so coverage review is a
//!   diff of a table
//! - IPv4-mapped IPv6 addresses classify through their embedded IPv4, so a
//!   `::ffff:10.0.0.1` cannot sidestep the IPv4 table

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

/// A reserved address block tagged with the reason it is blocked.
#[derive(Debug, Clone)]
pub struct AddressRange {
    pub net: IpNet,
    pub reason: String,
}

/// Built-in reserved ranges. Complete per the IANA special-purpose
/// registries for the address space this gateway refuses to reach.
const BUILTIN_RANGES: &[(&str, &str)] = &[
    ("0.0.0.0/8", "this-network"),
    ("10.0.0.0/8", "private-a"),
    ("127.0.0.0/8", "loopback"),
    ("169.254.0.0/16", "link-local"),
    ("172.16.0.0/12", "private-b"),
    ("192.168.0.0/16", "private-c"),
    ("::/128", "unspecified"),
    ("::1/128", "loopback"),
    ("fc00::/7", "unique-local"),
    ("fe80::/10", "link-local"),
];

/// Error for a config-supplied range that does not parse.
#[derive(Debug, Error)]
#[error("'{range}' is not a valid CIDR network")]
pub struct RangeParseError {
    pub range: String,
}

/// Decides whether a numeric address falls inside reserved/private space.
#[derive(Debug, Clone)]
pub struct AddressClassifier {
    ranges: Vec<AddressRange>,
}

impl AddressClassifier {
    /// Classifier over the built-in table plus deployment-specific extra
    /// CIDRs (e.g. container network subnets).
    pub fn from_config(extra_ranges: &[String]) -> Result<Self, RangeParseError> {
        let mut ranges = Self::builtin_ranges();
        for raw in extra_ranges {
            let net: IpNet = raw.parse().map_err(|_| RangeParseError {
                range: raw.clone(),
            })?;
            ranges.push(AddressRange {
                net,
                reason: "configured".to_string(),
            });
        }
        Ok(Self { ranges })
    }

    /// Classifier over an explicit table. Test seam and escape hatch for
    /// deployments that need to replace the built-ins entirely.
    pub fn with_ranges(ranges: Vec<AddressRange>) -> Self {
        Self { ranges }
    }

    /// The built-in reserved range table.
    pub fn builtin_ranges() -> Vec<AddressRange> {
        BUILTIN_RANGES
            .iter()
            .map(|(cidr, reason)| AddressRange {
                net: cidr.parse().expect("built-in range is valid CIDR"),
                reason: (*reason).to_string(),
            })
            .collect()
    }

    /// Return the matched range's reason if the address is reserved.
    pub fn classify(&self, ip: IpAddr) -> Option<&str> {
        // An IPv4-mapped IPv6 address is the IPv4 address in disguise.
        if let IpAddr::V6(v6) = ip {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return self.classify(IpAddr::V4(v4));
            }
        }

        self.ranges
            .iter()
            .find(|r| r.net.contains(&ip))
            .map(|r| r.reason.as_str())
    }

    /// Whether the address is inside reserved/private space.
    pub fn is_private(&self, ip: IpAddr) -> bool {
        self.classify(ip).is_some()
    }

    /// Fail-closed classification of a raw address string: anything that
    /// does not parse as an address is treated as private.
    pub fn is_private_str(&self, raw: &str) -> bool {
        match raw.parse::<IpAddr>() {
            Ok(ip) => self.is_private(ip),
            Err(_) => true,
        }
    }
}

impl Default for AddressClassifier {
    fn default() -> Self {
        Self {
            ranges: Self::builtin_ranges(),
        }
    }
}
