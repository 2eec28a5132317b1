//! HTTP server setup and the fetch endpoint.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, rate limiting)
//! - Compose validator → fetch guard for the /fetch endpoint
//! - Map every outcome to the boundary status contract:
//!   400 missing parameter, 429 rate limited, 403 policy deny/block,
//!   500 upstream or internal failure, 200 relay

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::fetch::FetchGuard;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::security::{rate_limit_middleware, RateLimiterState};
use crate::validate::address::{AddressClassifier, RangeParseError};
use crate::validate::resolver::{HostResolver, SystemResolver};
use crate::validate::UrlValidator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<UrlValidator>,
    pub guard: Arc<FetchGuard>,
}

impl AppState {
    /// Build the standard component stack from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RangeParseError> {
        let classifier = Arc::new(AddressClassifier::from_config(&config.policy.blocked_ranges)?);
        let resolver: Arc<dyn HostResolver> = Arc::new(SystemResolver);

        Ok(Self {
            validator: Arc::new(UrlValidator::from_config(
                &config.policy,
                classifier,
                resolver,
            )),
            guard: Arc::new(FetchGuard::from_config(
                &config.fetch,
                &config.policy.allowed_content_types,
            )),
        })
    }
}

/// HTTP server for the fetch gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server with the standard components built from config.
    pub fn new(config: GatewayConfig) -> Result<Self, RangeParseError> {
        let state = AppState::from_config(&config)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around pre-built components. Seam for tests and for
    /// deployments that plug in a custom resolver or rule set.
    pub fn with_state(config: GatewayConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let limiter = Arc::new(RateLimiterState::from_config(&config.rate_limit));

        // Outer bound on the whole request; the fetch guard's own timeout
        // fires first in the normal case.
        let request_timeout = Duration::from_secs(config.fetch.timeout_secs.saturating_add(5));

        Router::new()
            .route("/fetch", get(fetch_handler))
            .route_layer(middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    url: Option<String>,
}

/// Main gateway handler: validate the candidate URL, fetch under guard,
/// relay the verified body.
async fn fetch_handler(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    let Some(target_url) = params.url else {
        metrics::record_request("invalid_input", start);
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing-parameter",
            "Please provide a 'url' parameter",
        );
    };

    tracing::debug!(
        request_id = %request_id,
        url = %target_url,
        "Fetch requested"
    );

    let cleared = match state.validator.validate(&target_url).await {
        Ok(cleared) => cleared,
        Err(denial) => {
            tracing::info!(
                request_id = %request_id,
                code = denial.code.as_str(),
                reason = %denial.message,
                "URL denied"
            );
            metrics::record_denied(denial.code.as_str());
            metrics::record_request("denied", start);
            return error_response(StatusCode::FORBIDDEN, denial.code.as_str(), &denial.message);
        }
    };

    match state.guard.fetch(&cleared).await {
        Ok(fetched) => {
            tracing::debug!(
                request_id = %request_id,
                bytes = fetched.body.len(),
                content_type = %fetched.content_type,
                "Relaying upstream body"
            );
            metrics::record_request("success", start);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, fetched.content_type)],
                fetched.body,
            )
                .into_response()
        }
        Err(e) if e.is_policy() => {
            tracing::info!(
                request_id = %request_id,
                code = e.code(),
                "Fetch blocked"
            );
            metrics::record_request("blocked", start);
            error_response(StatusCode::FORBIDDEN, e.code(), &e.to_string())
        }
        Err(e) => {
            // Full detail stays in the log; the client gets a curated line.
            tracing::warn!(
                request_id = %request_id,
                code = e.code(),
                error = %e,
                "Upstream fetch failed"
            );
            metrics::record_request("upstream_error", start);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.code(),
                "Upstream request failed",
            )
        }
    }
}

async fn health_handler() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
