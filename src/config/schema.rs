//! Configuration schema definitions.
//!
//! Every type derives Serde traits for deserialization from TOML, and every
//! section has defaults matching the reference deployment.

use serde::{Deserialize, Serialize};

/// Placeholder secret used when none is configured. Startup warns about it.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Path prefix → backend base URL, checked in order (first match wins).
    pub routes: Vec<RouteConfig>,

    /// (method, path prefix) pairs exempt from authentication.
    pub public_routes: Vec<PublicRouteConfig>,

    /// Shared session/counter store connection.
    pub store: StoreConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Credential and session verification.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Pub/sub channels to listen on.
    pub events: EventsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: vec![
                RouteConfig::new("users", "/api/users", "http://localhost:3001"),
                RouteConfig::new("rides", "/api/rides", "http://localhost:3002"),
                RouteConfig::new("locations", "/api/locations", "http://localhost:3003"),
                RouteConfig::new("notifications", "/api/notifications", "http://localhost:3004"),
            ],
            public_routes: vec![
                PublicRouteConfig::new("POST", "/api/users/register"),
                PublicRouteConfig::new("POST", "/api/users/login"),
            ],
            store: StoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics. Defaults to the prefix.
    #[serde(default)]
    pub name: String,

    /// Path prefix to match (segment-aware).
    pub prefix: String,

    /// Backend base URL, e.g. "http://user-service:3001".
    pub backend_url: String,
}

impl RouteConfig {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, backend_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            backend_url: backend_url.into(),
        }
    }
}

/// A route that bypasses authentication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicRouteConfig {
    /// HTTP method, matched exactly.
    pub method: String,

    /// Path prefix to match.
    pub path_prefix: String,
}

impl PublicRouteConfig {
    pub fn new(method: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path_prefix: path_prefix.into(),
        }
    }
}

/// Shared store connection parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL (`redis://host:port`).
    pub url: String,

    /// Deadline for a single store round-trip in milliseconds.
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            op_timeout_ms: 1000,
        }
    }
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client per window.
    pub max_requests: u64,

    /// Counter key prefix; the client IP is appended.
    pub key_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            key_prefix: "rate:".to_string(),
        }
    }
}

/// Credential verification and session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret shared with the credential issuer.
    pub jwt_secret: String,

    /// Paths outside this prefix are the gateway's own and skip authentication.
    pub protected_prefix: String,

    /// Session record key prefix; the subject id is appended.
    pub session_key_prefix: String,

    /// Session record and credential lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Channel on which session changes are announced.
    pub session_channel: String,

    /// Send the specific failure reason to clients (otherwise "Unauthorized").
    pub expose_failure_reason: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            protected_prefix: "/api".to_string(),
            session_key_prefix: "session:".to_string(),
            session_ttl_secs: 24 * 60 * 60,
            session_channel: "session-events".to_string(),
            expose_failure_reason: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for a backend response in seconds (504 when exceeded).
    pub upstream_secs: u64,

    /// Overall request deadline in seconds.
    pub request_secs: u64,

    /// Idle pooled backend connection lifetime in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
            idle_secs: 90,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or full filter directive; `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Pub/sub listening configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Channels to subscribe to and log.
    pub channels: Vec<String>,
}
