//! Client-facing error taxonomy.
//!
//! Every variant maps to one status code and a short JSON body. Internal
//! detail (store errors, connection errors, panics) is logged where it
//! happens and never reaches the client.

use axum::http::header::{HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Client exceeded its quota for the current window.
    #[error("too many requests, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Any authentication failure; `message` is what the client sees.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Backend refused or dropped the connection.
    #[error("upstream unavailable")]
    UpstreamUnavailable,

    /// Backend did not answer within the upstream deadline.
    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("not found")]
    NotFound,

    /// Unexpected fault; detail stays in the logs.
    #[error("internal error")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::RateLimitExceeded { retry_after_secs } => {
                let body = Json(json!({
                    "error": "Too many requests",
                    "retryAfter": retry_after_secs,
                }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            Self::Unauthorized { message } => (status, Json(json!({ "error": message }))).into_response(),
            Self::UpstreamUnavailable => (status, Json(json!({ "error": "Bad gateway" }))).into_response(),
            Self::UpstreamTimeout => (status, Json(json!({ "error": "Gateway timeout" }))).into_response(),
            Self::NotFound => (status, Json(json!({ "error": "Not found" }))).into_response(),
            Self::Internal => (status, Json(json!({ "error": "Internal server error" }))).into_response(),
        }
    }
}
