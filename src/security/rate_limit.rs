//! Fixed-window rate limiting against the shared store.
//!
//! Each client gets a counter `rate:<ip>` that is created with a TTL equal
//! to the window on its first increment. Counts above the ceiling are
//! rejected until the key expires. Across a window boundary a client can
//! send up to twice the ceiling; that approximation is accepted.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{Decision, Stage, StageContext, StageFuture};
use crate::http::request::RequestView;
use crate::observability::metrics;
use crate::security::headers::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
use crate::store::{rate_key, SharedStore, StoreError};

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub retry_after_secs: u64,
}

impl RateDecision {
    /// Add the quota headers every response carries.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
    }
}

pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
    window: Duration,
    max_requests: u64,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SharedStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// Count one request for `client_id` and decide whether it is admitted.
    pub async fn admit(&self, client_id: &str) -> Result<RateDecision, StoreError> {
        let key = rate_key(&self.key_prefix, client_id);

        let count = self.store.incr_with_ttl(&key, self.window).await?;
        let ttl = self.store.ttl(&key).await?;

        let count = u64::try_from(count).unwrap_or(0);
        Ok(RateDecision {
            allowed: count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            retry_after_secs: ttl.map_or(self.window.as_secs(), |ttl| ttl.as_secs().max(1)),
        })
    }
}

/// First pipeline stage. Fails open when the store is unreachable.
pub struct RateLimitStage {
    limiter: RateLimiter,
}

impl RateLimitStage {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn apply<'a>(&'a self, request: &'a RequestView, ctx: &'a mut StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            let client = request.client_id();

            let decision = match self.limiter.admit(&client).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!(
                        request_id = %request.request_id(),
                        client = %client,
                        error = %e,
                        "Rate limiter store error, failing open"
                    );
                    metrics::record_store_error("rate_limit");
                    return Decision::Continue;
                }
            };

            decision.apply_headers(&mut ctx.response_headers);

            if decision.allowed {
                return Decision::Continue;
            }

            tracing::warn!(
                request_id = %request.request_id(),
                client = %client,
                limit = decision.limit,
                retry_after = decision.retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            Decision::Respond(
                GatewayError::RateLimitExceeded {
                    retry_after_secs: decision.retry_after_secs,
                }
                .into_response(),
            )
        })
    }
}
