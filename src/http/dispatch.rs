//! Router/Dispatcher: forward to a backend by path prefix.
//!
//! # Responsibilities
//! - Pick the first route whose prefix matches the path
//! - Forward method, full original path + query, headers and body
//! - Relay the backend's status, headers and body unchanged
//! - Serve the gateway's own endpoints when no route matches
//!
//! # Design Decisions
//! - One pooled client shared by all requests
//! - Deadline on the backend response: 504 on expiry, 502 on transport failure
//! - Connection errors are logged, never echoed to the client
//! - Dropping the request future (client gone) drops the backend call

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceExt;

use crate::error::GatewayError;
use crate::http::request::RequestView;
use crate::observability::metrics;
use crate::routing::{Route, RouteTable};
use crate::security::headers::ForwardHeaders;

pub struct Dispatcher {
    routes: Arc<RouteTable>,
    client: Client<HttpConnector, Body>,
    local: axum::Router,
    upstream_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        local: axum::Router,
        connect_timeout: Duration,
        upstream_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle_timeout)
            .build(connector);

        Self {
            routes,
            client,
            local,
            upstream_timeout,
        }
    }

    pub fn route_name(&self, path: &str) -> Option<&str> {
        self.routes.lookup(path).map(|route| route.name.as_str())
    }

    pub async fn dispatch(&self, request: &RequestView, forward: ForwardHeaders, body: Body) -> Response {
        match self.routes.lookup(request.path()) {
            Some(route) => match self.forward(route, request, forward, body).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            },
            None => self.handle_locally(request, forward, body).await,
        }
    }

    async fn forward(
        &self,
        route: &Route,
        request: &RequestView,
        mut forward: ForwardHeaders,
        body: Body,
    ) -> Result<Response, GatewayError> {
        let uri = route.backend.target_uri(request.uri().path_and_query()).map_err(|e| {
            tracing::error!(request_id = %request.request_id(), target = %route.backend, error = %e, "Failed to build backend URI");
            GatewayError::Internal
        })?;

        forward.prepare_for_backend(route.backend.authority().as_str(), request.client_ip());

        let mut outbound = Request::builder()
            .method(request.method().clone())
            .uri(uri)
            .body(body)
            .map_err(|e| {
                tracing::error!(request_id = %request.request_id(), error = %e, "Failed to build backend request");
                GatewayError::Internal
            })?;
        *outbound.headers_mut() = forward.into_inner();

        tracing::info!(
            request_id = %request.request_id(),
            method = %request.method(),
            path = %request.uri(),
            target = %route.backend,
            "Forwarding request"
        );

        let start = Instant::now();
        match tokio::time::timeout(self.upstream_timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => {
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => {
                tracing::error!(
                    request_id = %request.request_id(),
                    target = %route.backend,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Upstream request failed"
                );
                metrics::record_upstream_error("unavailable");
                Err(GatewayError::UpstreamUnavailable)
            }
            Err(_) => {
                tracing::error!(
                    request_id = %request.request_id(),
                    target = %route.backend,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream request timed out"
                );
                metrics::record_upstream_error("timeout");
                Err(GatewayError::UpstreamTimeout)
            }
        }
    }

    /// No route matched: the gateway's own router answers (404 for unknown paths).
    async fn handle_locally(&self, request: &RequestView, forward: ForwardHeaders, body: Body) -> Response {
        let mut local = Request::new(body);
        *local.method_mut() = request.method().clone();
        *local.uri_mut() = request.uri().clone();
        *local.version_mut() = request.version();
        *local.headers_mut() = forward.into_inner();

        match self.local.clone().oneshot(local).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}
