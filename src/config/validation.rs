//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window, ceiling, timeouts > 0)
//! - Check route prefixes and backend URLs
//! - Detect duplicate route prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &GatewayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;

use crate::config::schema::GatewayConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{i}]");
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::new(format!("{field}.prefix"), "must start with '/'"));
        }
        if !seen.insert(route.prefix.trim_end_matches('/')) {
            errors.push(ValidationError::new(format!("{field}.prefix"), "duplicate route prefix"));
        }
        if let Err(message) = check_backend_url(&route.backend_url) {
            errors.push(ValidationError::new(format!("{field}.backend_url"), message));
        }
    }

    for (i, public) in config.public_routes.iter().enumerate() {
        let field = format!("public_routes[{i}]");
        if Method::from_bytes(public.method.to_ascii_uppercase().as_bytes()).is_err() {
            errors.push(ValidationError::new(format!("{field}.method"), "not an HTTP method"));
        }
        if !public.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(format!("{field}.path_prefix"), "must start with '/'"));
        }
    }

    if config.store.url.trim().is_empty() {
        errors.push(ValidationError::new("store.url", "must not be empty"));
    }
    if config.store.op_timeout_ms == 0 {
        errors.push(ValidationError::new("store.op_timeout_ms", "must be greater than 0"));
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
    }
    if !config.auth.protected_prefix.starts_with('/') {
        errors.push(ValidationError::new("auth.protected_prefix", "must start with '/'"));
    }
    if config.auth.session_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.session_ttl_secs", "must be greater than 0"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.upstream_secs", timeouts.upstream_secs),
        ("timeouts.request_secs", timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    // The overall request deadline wraps the backend call; it must fire last
    // so a slow backend surfaces as 504 from the dispatcher.
    if timeouts.upstream_secs >= timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.upstream_secs",
            "must be less than timeouts.request_secs",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_backend_url(raw: &str) -> Result<(), &'static str> {
    let url = url::Url::parse(raw).map_err(|_| "not an absolute URL")?;
    if url.scheme() != "http" {
        return Err("only http:// backends are supported");
    }
    if url.host_str().is_none() {
        return Err("missing host");
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PublicRouteConfig, RouteConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = 0;
        config.auth.jwt_secret.clear();
        config.routes.push(RouteConfig::new("dup", "/api/users/", "http://localhost:9"));
        config.routes.push(RouteConfig::new("bad", "api/x", "ftp://files"));
        config.public_routes.push(PublicRouteConfig::new("GE T", "/x"));

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert!(fields.contains(&"rate_limit.window_secs"));
        assert!(fields.contains(&"auth.jwt_secret"));
        assert!(fields.contains(&"routes[4].prefix"));
        assert!(fields.contains(&"routes[5].prefix"));
        assert!(fields.contains(&"routes[5].backend_url"));
        assert!(fields.contains(&"public_routes[2].method"));
    }

    #[test]
    fn test_upstream_deadline_must_fit_inside_request_deadline() {
        let mut config = GatewayConfig::default();
        config.timeouts.upstream_secs = 5;
        config.timeouts.request_secs = 1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "timeouts.upstream_secs");

        config.timeouts.request_secs = 5;
        assert!(validate_config(&config).is_err());

        config.timeouts.request_secs = 6;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_backend_url_rules() {
        assert!(check_backend_url("http://user-service:3001").is_ok());
        assert!(check_backend_url("http://10.0.0.2:8080/base").is_ok());
        assert!(check_backend_url("https://secure:443").is_err());
        assert!(check_backend_url("localhost:3001").is_err());
        assert!(check_backend_url("http://host:1/?q=1").is_err());
    }
}
