//! Ordered, short-circuiting request pipeline.
//!
//! # Data Flow
//! ```text
//! RequestView + StageContext
//!     → stage 1 (rate limit)   ─ Respond(429) ─┐
//!     → stage 2 (auth)         ─ Respond(401) ─┤
//!     → dispatcher (forward or local endpoint) │
//!     → response + context response headers ◀──┘
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit list, applied strictly in order
//! - A stage sees an immutable request view; everything it wants to change
//!   goes through the context (forward headers, response headers, identity)
//! - Response headers set by any stage are applied to whatever response is returned

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::http::dispatch::Dispatcher;
use crate::http::request::RequestView;
use crate::observability::metrics;
use crate::security::auth::Identity;
use crate::security::headers::ForwardHeaders;

pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Decision> + Send + 'a>>;

/// Outcome of a single stage.
#[derive(Debug)]
pub enum Decision {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

/// Mutable state threaded through the stages of one request.
#[derive(Debug)]
pub struct StageContext {
    /// Headers to send to the backend.
    pub forward: ForwardHeaders,
    /// Headers to add to the client response, whatever it turns out to be.
    pub response_headers: HeaderMap,
    /// Verified identity, once the authenticator has run.
    pub identity: Option<Identity>,
}

impl StageContext {
    pub fn new(request: &RequestView) -> Self {
        Self {
            forward: ForwardHeaders::from_inbound(request.headers()),
            response_headers: HeaderMap::new(),
            identity: None,
        }
    }
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply<'a>(&'a self, request: &'a RequestView, ctx: &'a mut StageContext) -> StageFuture<'a>;
}

/// Runs stages in order, then dispatches.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>, dispatcher: Dispatcher) -> Self {
        Self { stages, dispatcher }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn execute(&self, request: RequestView, body: Body) -> Response {
        let start = Instant::now();
        let mut ctx = StageContext::new(&request);

        for stage in &self.stages {
            if let Decision::Respond(response) = stage.apply(&request, &mut ctx).await {
                tracing::debug!(
                    request_id = %request.request_id(),
                    stage = stage.name(),
                    status = response.status().as_u16(),
                    "Pipeline short-circuited"
                );
                return finish(&request, response, ctx.response_headers, stage.name(), start);
            }
        }

        let route = self.dispatcher.route_name(request.path()).unwrap_or("gateway").to_string();
        let response = self.dispatcher.dispatch(&request, ctx.forward, body).await;
        finish(&request, response, ctx.response_headers, &route, start)
    }
}

fn finish(request: &RequestView, mut response: Response, extra: HeaderMap, label: &str, start: Instant) -> Response {
    response.headers_mut().extend(extra);
    metrics::record_request(request.method().as_str(), response.status().as_u16(), label, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteTable;
    use axum::http::{HeaderValue, Request, StatusCode};
    use axum::response::IntoResponse;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        respond_with: Option<StatusCode>,
    }

    impl Stage for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn apply<'a>(&'a self, _request: &'a RequestView, ctx: &'a mut StageContext) -> StageFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.name);
                ctx.response_headers
                    .insert("x-stage", HeaderValue::from_static(self.name));
                match self.respond_with {
                    Some(status) => Decision::Respond(status.into_response()),
                    None => Decision::Continue,
                }
            })
        }
    }

    fn view(path: &str) -> RequestView {
        let (parts, _) = Request::builder().uri(path).body(Body::empty()).unwrap().into_parts();
        RequestView::new(parts, "127.0.0.1:1000".parse().unwrap())
    }

    fn pipeline(log: &Arc<Mutex<Vec<&'static str>>>, second: Option<StatusCode>) -> Pipeline {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(Recording { name: "first", log: log.clone(), respond_with: None }),
            Arc::new(Recording { name: "second", log: log.clone(), respond_with: second }),
            Arc::new(Recording { name: "third", log: log.clone(), respond_with: None }),
        ];
        let dispatcher = Dispatcher::new(
            Arc::new(RouteTable::default()),
            axum::Router::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        Pipeline::new(stages, dispatcher)
    }

    #[tokio::test]
    async fn test_stages_run_in_order_then_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(&log, None);

        let response = pipeline.execute(view("/nowhere"), Body::empty()).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        // Empty local router answers 404; context headers still applied.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-stage").unwrap(), "third");
    }

    #[tokio::test]
    async fn test_short_circuit_stops_later_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(&log, Some(StatusCode::TOO_MANY_REQUESTS));

        let response = pipeline.execute(view("/nowhere"), Body::empty()).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("x-stage").unwrap(), "second");
        assert_eq!(pipeline.stage_names(), vec!["first", "second", "third"]);
    }
}
