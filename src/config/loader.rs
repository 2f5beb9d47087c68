//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, PublicRouteConfig, RouteConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment variable {name}: {message}")]
    Env { name: &'static str, message: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the TOML file (if any), apply process environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment-style configuration surface, applied on top of the file.
///
/// - `GATEWAY_BIND` (full address) or `PORT` (port on 0.0.0.0)
/// - `JWT_SECRET`
/// - `REDIS_URL`, or `REDIS_HOST` / `REDIS_PORT`
/// - `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_MAX_REQUESTS`
/// - `GATEWAY_ROUTES`: `/prefix=http://host:port,...`
/// - `GATEWAY_PUBLIC_ROUTES`: `METHOD /prefix,...`
/// - `UPSTREAM_TIMEOUT_SECS`, `LOG_LEVEL`
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(bind) = var("GATEWAY_BIND") {
        config.listener.bind_address = bind;
    } else if let Some(port) = var("PORT") {
        let port: u16 = parse_env("PORT", &port)?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }

    if let Some(secret) = var("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }

    if let Some(url) = var("REDIS_URL") {
        config.store.url = url;
    } else if var("REDIS_HOST").is_some() || var("REDIS_PORT").is_some() {
        let host = var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
        let port: u16 = match var("REDIS_PORT") {
            Some(port) => parse_env("REDIS_PORT", &port)?,
            None => 6379,
        };
        config.store.url = format!("redis://{host}:{port}");
    }

    if let Some(window) = var("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", &window)?;
    }
    if let Some(max) = var("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", &max)?;
    }

    if let Some(routes) = var("GATEWAY_ROUTES") {
        config.routes = parse_routes(&routes)?;
    }
    if let Some(public) = var("GATEWAY_PUBLIC_ROUTES") {
        config.public_routes = parse_public_routes(&public)?;
    }

    if let Some(secs) = var("UPSTREAM_TIMEOUT_SECS") {
        config.timeouts.upstream_secs = parse_env("UPSTREAM_TIMEOUT_SECS", &secs)?;
    }
    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    Ok(())
}

fn parse_env<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Env {
        name,
        message: e.to_string(),
    })
}

fn parse_routes(raw: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, url) = entry.split_once('=').ok_or_else(|| ConfigError::Env {
                name: "GATEWAY_ROUTES",
                message: format!("expected /prefix=url, got {entry:?}"),
            })?;
            let prefix = prefix.trim();
            Ok(RouteConfig::new(prefix, prefix, url.trim()))
        })
        .collect()
}

fn parse_public_routes(raw: &str) -> Result<Vec<PublicRouteConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (method, prefix) = entry.split_once(char::is_whitespace).ok_or_else(|| ConfigError::Env {
                name: "GATEWAY_PUBLIC_ROUTES",
                message: format!("expected METHOD /prefix, got {entry:?}"),
            })?;
            Ok(PublicRouteConfig::new(method.trim().to_ascii_uppercase(), prefix.trim()))
        })
        .collect()
}
