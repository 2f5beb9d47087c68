//! Shared utilities for gateway integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_gateway::config::{GatewayConfig, RouteConfig};
use edge_gateway::http::HttpServer;
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::security::{Identity, SessionIssuer};
use edge_gateway::store::{MemoryStore, SharedStore};

/// Start a backend that answers every request with a JSON description of
/// what it received: method, path with query, headers and body.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().fallback(echo);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(request: Request<Body>) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let headers: Map<String, Value> = parts
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_str().unwrap_or("").to_string())))
        .collect();
    let body = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();

    let status = if parts.method == "POST" { StatusCode::CREATED } else { StatusCode::OK };
    (
        status,
        [("x-backend", "echo")],
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
            "headers": headers,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// Start a raw TCP backend that waits `delay` before writing a fixed
/// HTTP/1.1 response.
pub async fn start_delayed_backend(delay: Duration, status_line: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        tokio::time::sleep(delay).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nX-Backend: raw\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Default configuration with every route pointed at `backend`.
pub fn config_for(backend: SocketAddr) -> GatewayConfig {
    let url = format!("http://{backend}");
    let mut config = GatewayConfig::default();
    config.routes = vec![
        RouteConfig::new("users", "/api/users", &url),
        RouteConfig::new("rides", "/api/rides", &url),
        RouteConfig::new("locations", "/api/locations", &url),
        RouteConfig::new("notifications", "/api/notifications", &url),
    ];
    config.events.channels.clear();
    config
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub store: MemoryStore,
    pub issuer: SessionIssuer,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Log a subject in and return the bearer token.
    pub async fn login(&self, id: &str, role: &str) -> String {
        let identity = Identity {
            id: id.to_string(),
            email: format!("user{id}@example.com"),
            role: role.to_string(),
        };
        self.issuer.login(&identity).await.unwrap().token
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway over `store` on an ephemeral port.
pub async fn spawn_server(config: GatewayConfig, store: Arc<dyn SharedStore>) -> (SocketAddr, Shutdown) {
    let server = HttpServer::new(config, store).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

/// Start a gateway over an in-memory store on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let store = MemoryStore::new();
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
    let issuer = SessionIssuer::new(shared.clone(), &config.auth);
    let (addr, shutdown) = spawn_server(config, shared).await;

    TestGateway {
        addr,
        store,
        issuer,
        shutdown,
    }
}
