//! Guarded outbound fetch.
//!
//! # Responsibilities
//! - Issue the upstream request with redirect following disabled
//! - Pin the connection to the address validation resolved
//! - Enforce the wall-clock timeout and the body size limit (declared
//!   length AND streaming cutoff; the header is untrustworthy)
//! - Enforce the content-type allow-list as a hard block
//!
//! # Design Decisions
//! - A 3xx is Blocked, never followed: a redirect target would need full
//!   re-validation and no trusted re-entry point exists here
//! - Guard failures are structured errors; raw upstream error text never
//!   reaches the client

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client};
use thiserror::Error;

use crate::config::FetchConfig;
use crate::validate::Cleared;

/// A relayable upstream response.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Upstream HTTP status (always 2xx).
    pub status: u16,
    /// Verified Content-Type header value, relayed unchanged.
    pub content_type: String,
    /// Body bytes, complete and under the size limit.
    pub body: Bytes,
}

/// Why a guarded fetch did not produce a relayable body.
///
/// Policy variants map to 403 at the boundary; the rest are upstream or
/// internal failures and map to 500.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("redirects are not allowed")]
    RedirectBlocked { status: u16 },

    #[error("response exceeds the maximum allowed size")]
    TooLarge { limit: u64 },

    #[error("content type '{found}' is not allowed")]
    ContentTypeBlocked { found: String },

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream connection failed")]
    Connect,

    #[error("upstream request failed")]
    Request,

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("error reading upstream response body")]
    Body,

    #[error("failed to construct upstream client")]
    Client,
}

impl FetchError {
    /// Stable machine-readable code for response bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::RedirectBlocked { .. } => "redirect-blocked",
            FetchError::TooLarge { .. } => "response-too-large",
            FetchError::ContentTypeBlocked { .. } => "content-type-not-allowed",
            FetchError::Timeout => "upstream-timeout",
            FetchError::Connect => "upstream-connect-failed",
            FetchError::Request => "upstream-request-failed",
            FetchError::UpstreamStatus { .. } => "upstream-error-status",
            FetchError::Body => "upstream-body-error",
            FetchError::Client => "internal-error",
        }
    }

    /// Whether this is a policy block (403) rather than an upstream or
    /// internal failure (500).
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            FetchError::RedirectBlocked { .. }
                | FetchError::TooLarge { .. }
                | FetchError::ContentTypeBlocked { .. }
        )
    }
}

/// Performs the network fetch for URLs the validator has cleared.
pub struct FetchGuard {
    timeout: Duration,
    max_bytes: u64,
    allowed_content_types: Vec<String>,
}

impl FetchGuard {
    pub fn from_config(fetch: &FetchConfig, allowed_content_types: &[String]) -> Self {
        Self {
            timeout: Duration::from_secs(fetch.timeout_secs),
            max_bytes: fetch.max_response_bytes,
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
        }
    }

    /// Fetch a cleared URL and return the verified body.
    ///
    /// Precondition: `cleared` came out of the validation pipeline. The
    /// connection is pinned to the resolved address, so a DNS answer that
    /// changes between validation and fetch cannot redirect the request.
    pub async fn fetch(&self, cleared: &Cleared) -> Result<FetchedBody, FetchError> {
        let client = self.build_client(cleared)?;

        let response = client
            .get(cleared.url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if e.is_connect() {
                    FetchError::Connect
                } else {
                    FetchError::Request
                }
            })?;

        let status = response.status();

        if status.is_redirection() {
            return Err(FetchError::RedirectBlocked {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        // Declared length first; it is a cheap early out, not the gate.
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let content_type = self.verify_content_type(&response)?;

        let mut stream = response.bytes_stream();
        let mut body = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Body
                }
            })?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedBody {
            status: status.as_u16(),
            content_type,
            body: body.freeze(),
        })
    }

    fn build_client(&self, cleared: &Cleared) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(self.timeout);

        // Pin domain hosts to the validated address. Literal hosts already
        // are their own address.
        if cleared.url.literal_ip().is_none() {
            if let Some(addr) = cleared.primary_addr() {
                builder = builder.resolve(
                    cleared.url.host_str(),
                    SocketAddr::new(addr, cleared.url.port()),
                );
            }
        }

        builder.build().map_err(|e| {
            tracing::error!(error = %e, "failed to build upstream client");
            FetchError::Client
        })
    }

    fn verify_content_type(&self, response: &reqwest::Response) -> Result<String, FetchError> {
        let header = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        // "image/png; charset=..." matches on the media type alone.
        let essence = header
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        if essence.is_empty() || !self.allowed_content_types.contains(&essence) {
            return Err(FetchError::ContentTypeBlocked {
                found: if header.is_empty() {
                    "(missing)".to_string()
                } else {
                    essence
                },
            });
        }

        Ok(header.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::url::CandidateUrl;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn guard(max_bytes: u64) -> FetchGuard {
        FetchGuard::from_config(
            &FetchConfig {
                timeout_secs: 5,
                max_response_bytes: max_bytes,
            },
            &["image/png".to_string(), "image/jpeg".to_string()],
        )
    }

    fn cleared_for(url: &str) -> Cleared {
        let url = CandidateUrl::parse(url).unwrap();
        let resolved = url.literal_ip().into_iter().collect();
        Cleared { url, resolved }
    }

    #[tokio::test]
    async fn test_success_relays_body_and_content_type() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"\x89PNG-bytes".to_vec(), "image/png"),
            )
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let fetched = guard(1024).fetch(&cleared).await.unwrap();

        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.content_type, "image/png");
        assert_eq!(&fetched.body[..], b"\x89PNG-bytes");
    }

    #[tokio::test]
    async fn test_redirect_is_blocked_not_followed() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://10.0.0.1/x.png"),
            )
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let err = guard(1024).fetch(&cleared).await.unwrap_err();

        assert!(matches!(err, FetchError::RedirectBlocked { status: 302 }));
        assert!(err.is_policy());
    }

    #[tokio::test]
    async fn test_content_type_mismatch_is_blocked() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"<h1>secrets</h1>".to_vec(), "text/html"),
            )
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let err = guard(1024).fetch(&cleared).await.unwrap_err();

        assert!(matches!(err, FetchError::ContentTypeBlocked { .. }));
        assert!(err.is_policy());
    }

    // No image content type on the response, whether the header is absent
    // or a server default; either way the relay is refused.
    #[tokio::test]
    async fn test_undeclared_content_type_is_blocked() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let err = guard(1024).fetch(&cleared).await.unwrap_err();

        assert!(matches!(err, FetchError::ContentTypeBlocked { .. }));
    }

    #[tokio::test]
    async fn test_content_type_parameters_ignored_for_matching() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"data".to_vec(), "image/png; charset=binary"),
            )
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let fetched = guard(1024).fetch(&cleared).await.unwrap();
        assert_eq!(fetched.content_type, "image/png; charset=binary");
    }

    #[tokio::test]
    async fn test_oversized_body_is_blocked() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4096], "image/png"))
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let err = guard(1024).fetch(&cleared).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
        assert!(err.is_policy());
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_not_relayed() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(500).set_body_string("stack trace here"))
            .mount(&upstream)
            .await;

        let cleared = cleared_for(&format!("{}/photo.png", upstream.uri()));
        let err = guard(1024).fetch(&cleared).await.unwrap_err();

        assert!(matches!(err, FetchError::UpstreamStatus { status: 500 }));
        assert!(!err.is_policy());
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_error() {
        // Nothing listens on this port.
        let cleared = cleared_for("http://127.0.0.1:1/x.png");
        let err = guard(1024).fetch(&cleared).await.unwrap_err();
        assert!(!err.is_policy());
    }
}
