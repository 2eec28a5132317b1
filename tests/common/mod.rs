//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fetch_gateway::config::GatewayConfig;
use fetch_gateway::fetch::FetchGuard;
use fetch_gateway::validate::address::AddressClassifier;
use fetch_gateway::validate::resolver::{HostResolver, SystemResolver};
use fetch_gateway::{AppState, GatewayServer, UrlValidator};

/// Spawn a gateway with the standard component stack on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let server = GatewayServer::new(config).unwrap();
    spawn(server).await
}

/// Spawn a gateway whose classifier treats nothing as private, so tests
/// can fetch from a mock upstream on loopback. Everything else is built
/// from the given config.
pub async fn spawn_permissive_gateway(config: GatewayConfig) -> SocketAddr {
    let classifier = Arc::new(AddressClassifier::with_ranges(Vec::new()));
    let resolver: Arc<dyn HostResolver> = Arc::new(SystemResolver);

    let state = AppState {
        validator: Arc::new(UrlValidator::from_config(
            &config.policy,
            classifier,
            resolver,
        )),
        guard: Arc::new(FetchGuard::from_config(
            &config.fetch,
            &config.policy.allowed_content_types,
        )),
    };

    spawn(GatewayServer::with_state(config, state)).await
}

async fn spawn(server: GatewayServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}

/// A config with rate limiting off, so unrelated tests do not consume each
/// other's budget.
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = false;
    config
}

/// Start a raw mock backend that serves a chunked image response with no
/// Content-Length header, `chunks` chunks of 1024 bytes each.
///
/// wiremock always declares a length, so this is the only way to exercise
/// the streaming size cutoff.
pub async fn start_chunked_backend(chunks: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        // Drain the request head before responding.
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let head = "HTTP/1.1 200 OK\r\n\
                                    Content-Type: image/png\r\n\
                                    Transfer-Encoding: chunked\r\n\
                                    Connection: close\r\n\r\n";
                        let _ = socket.write_all(head.as_bytes()).await;

                        let chunk = [0u8; 1024];
                        for _ in 0..chunks {
                            let _ = socket.write_all(b"400\r\n").await;
                            let _ = socket.write_all(&chunk).await;
                            let _ = socket.write_all(b"\r\n").await;
                        }
                        let _ = socket.write_all(b"0\r\n\r\n").await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
