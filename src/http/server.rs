//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the pipeline (rate limit → auth → dispatch) from configuration
//! - Create the axum router with its middleware stack
//! - Serve the gateway's own endpoints (`/`, `/health`)
//! - Run until the shutdown signal, draining in-flight requests

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::dispatch::Dispatcher;
use crate::http::pipeline::{Pipeline, Stage};
use crate::http::request::RequestView;
use crate::routing::{PublicRoutes, RouteError, RouteTable};
use crate::security::auth::{AuthStage, SessionAuthenticator};
use crate::security::rate_limit::{RateLimitStage, RateLimiter};
use crate::store::{EventListener, SharedStore};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    store: Arc<dyn SharedStore>,
}

impl HttpServer {
    /// Create a server over a shared store, connected or not.
    pub fn new(config: GatewayConfig, store: Arc<dyn SharedStore>) -> Result<Self, RouteError> {
        let pipeline = Arc::new(build_pipeline(&config, store.clone())?);

        tracing::info!(stages = ?pipeline.stage_names(), routes = config.routes.len(), "Pipeline ready");

        let router = Self::build_router(&config, AppState { pipeline });
        Ok(Self { router, config, store })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(CatchPanicLayer::custom(handle_panic))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if !self.config.events.channels.is_empty() {
            let events = EventListener::new(self.store.clone(), self.config.events.channels.clone());
            tokio::spawn(events.run(shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assemble the stages in their fixed order: throttling before any
/// cryptographic or session work.
pub fn build_pipeline(config: &GatewayConfig, store: Arc<dyn SharedStore>) -> Result<Pipeline, RouteError> {
    let routes = Arc::new(RouteTable::from_config(&config.routes)?);
    let public_routes = PublicRoutes::from_config(&config.public_routes)?;

    let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
    if config.rate_limit.enabled {
        let limiter = RateLimiter::new(store.clone(), &config.rate_limit);
        stages.push(Arc::new(RateLimitStage::new(limiter)));
    } else {
        tracing::warn!("Rate limiting disabled");
    }

    let authenticator = SessionAuthenticator::new(store, &config.auth, public_routes);
    stages.push(Arc::new(AuthStage::new(authenticator, config.auth.expose_failure_reason)));

    let dispatcher = Dispatcher::new(
        routes,
        gateway_endpoints(Instant::now()),
        Duration::from_secs(config.timeouts.connect_secs),
        Duration::from_secs(config.timeouts.upstream_secs),
        Duration::from_secs(config.timeouts.idle_secs),
    );

    Ok(Pipeline::new(stages, dispatcher))
}

/// Every inbound request goes through the pipeline.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    state.pipeline.execute(RequestView::new(parts, addr), body).await
}

/// The gateway's own endpoints, reached when no route prefix matches.
pub fn gateway_endpoints(started: Instant) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(started)
}

async fn root() -> Json<Value> {
    Json(json!({ "service": "api-gateway", "status": "running" }))
}

async fn health(State(started): State<Instant>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "api-gateway",
        "uptime": started.elapsed().as_secs_f64(),
    }))
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    GatewayError::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn get_json(router: Router, path: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_gateway_endpoints() {
        let (status, body) = get_json(gateway_endpoints(Instant::now()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "api-gateway");

        let (status, body) = get_json(gateway_endpoints(Instant::now()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["uptime"].is_number());

        let (status, body) = get_json(gateway_endpoints(Instant::now()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[test]
    fn test_pipeline_stage_order() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let pipeline = build_pipeline(&GatewayConfig::default(), store.clone()).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["rate_limit", "auth"]);

        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        assert_eq!(build_pipeline(&config, store).unwrap().stage_names(), vec!["auth"]);
    }

    #[test]
    fn test_panic_payload_becomes_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
