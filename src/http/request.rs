//! Immutable view of an inbound request.
//!
//! # Responsibilities
//! - Capture method, URI, headers and client address once per request
//! - Expose the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - The view is read-only; stages express changes through `StageContext`
//! - The body is not part of the view and goes straight to the dispatcher

use std::net::{IpAddr, SocketAddr};

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri, Version};

pub const X_REQUEST_ID: &str = "x-request-id";

/// What the pipeline stages see of a request.
#[derive(Debug, Clone)]
pub struct RequestView {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    client_addr: SocketAddr,
    request_id: String,
}

impl RequestView {
    pub fn new(parts: Parts, client_addr: SocketAddr) -> Self {
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            client_addr,
            request_id,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Inbound headers exactly as received.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn client_ip(&self) -> IpAddr {
        self.client_addr.ip()
    }

    /// Identifier used for per-client throttling.
    pub fn client_id(&self) -> String {
        self.client_addr.ip().to_string()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}
