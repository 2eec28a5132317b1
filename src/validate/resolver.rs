//! Hostname resolution.
//!
//! Resolution failure is an explicit error, never an empty success: the
//! pipeline turns it into a deny. No caching — every validation resolves
//! fresh, and the fetch pins the address this lookup produced.

use std::net::IpAddr;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

/// Error from a hostname lookup.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lookup failed for '{host}': {message}")]
    Lookup { host: String, message: String },

    #[error("'{host}' resolved to no addresses")]
    NoAddresses { host: String },
}

/// Forward DNS lookup, returning every address the name resolves to.
///
/// Object-safe so the validator can hold `Arc<dyn HostResolver>`; tests
/// substitute a scripted resolver.
pub trait HostResolver: Send + Sync {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>>;
}

/// Resolver backed by the operating system via tokio.
#[derive(Debug, Default, Clone)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, ResolveError>> {
        async move {
            let addrs = tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| ResolveError::Lookup {
                    host: host.to_string(),
                    message: e.to_string(),
                })?;

            let mut ips: Vec<IpAddr> = addrs.map(|sa| sa.ip()).collect();
            ips.dedup();

            if ips.is_empty() {
                return Err(ResolveError::NoAddresses {
                    host: host.to_string(),
                });
            }
            Ok(ips)
        }
        .boxed()
    }
}
