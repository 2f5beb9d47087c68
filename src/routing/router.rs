//! Route lookup.
//!
//! # Responsibilities
//! - Store the compiled route table and public-route allowlist
//! - Look up the first route whose prefix matches a path
//! - Build the backend URI that keeps the original path and query
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(n) prefix scan in configured order (route counts are small)
//! - Explicit `None` rather than a silent default route

use std::fmt;

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Method, Uri};

use crate::config::schema::{PublicRouteConfig, RouteConfig};
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathPrefixMatcher};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {name}: invalid backend url {url}: {reason}")]
    InvalidBackend {
        name: String,
        url: String,
        reason: String,
    },
    #[error("public route {prefix}: invalid method {method}")]
    InvalidMethod { method: String, prefix: String },
}

/// Parsed backend base URL.
#[derive(Debug, Clone)]
pub struct Backend {
    authority: Authority,
    base_path: String,
    display: String,
}

impl Backend {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = url::Url::parse(raw).map_err(|e| e.to_string())?;
        if url.scheme() != "http" {
            return Err(format!("unsupported scheme {}", url.scheme()));
        }
        let host = url.host_str().ok_or("missing host")?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority: Authority = format!("{host}:{port}").parse().map_err(|e: axum::http::uri::InvalidUri| e.to_string())?;

        Ok(Self {
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
            display: raw.trim_end_matches('/').to_string(),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Backend URI for an inbound path (and optional query), without stripping
    /// the matched prefix.
    pub fn target_uri(&self, original: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        let original = original.map(PathAndQuery::as_str).unwrap_or("/");
        let path_and_query = format!("{}{}", self.base_path, original);

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub backend: Backend,
}

/// Ordered, immutable path-prefix → backend table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let routes = configs
            .iter()
            .map(|config| {
                let name = if config.name.is_empty() {
                    config.prefix.clone()
                } else {
                    config.name.clone()
                };
                let backend = Backend::parse(&config.backend_url).map_err(|reason| RouteError::InvalidBackend {
                    name: name.clone(),
                    url: config.backend_url.clone(),
                    reason,
                })?;
                Ok(Route {
                    name,
                    matcher: PathPrefixMatcher::new(config.prefix.as_str()),
                    backend,
                })
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        Ok(Self { routes })
    }

    /// First route whose prefix matches `path`.
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches_path(path))
    }
}

/// Allowlist of (method, path prefix) pairs that skip authentication.
#[derive(Debug, Default)]
pub struct PublicRoutes {
    entries: Vec<AndMatcher>,
}

impl PublicRoutes {
    pub fn from_config(configs: &[PublicRouteConfig]) -> Result<Self, RouteError> {
        let entries = configs
            .iter()
            .map(|config| {
                let method = Method::from_bytes(config.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
                    RouteError::InvalidMethod {
                        method: config.method.clone(),
                        prefix: config.path_prefix.clone(),
                    }
                })?;
                Ok(AndMatcher::new(vec![
                    Box::new(MethodMatcher::new(method)),
                    Box::new(PathPrefixMatcher::new(config.path_prefix.as_str())),
                ]))
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        Ok(Self { entries })
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::from_config(&[
            RouteConfig::new("users-admin", "/api/users/admin", "http://admin:4000"),
            RouteConfig::new("users", "/api/users", "http://users:3001"),
            RouteConfig::new("rides", "/api/rides", "http://rides:3002/v1/"),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_match_in_configured_order() {
        let table = table();
        assert_eq!(table.lookup("/api/users/admin/stats").unwrap().name, "users-admin");
        assert_eq!(table.lookup("/api/users/7").unwrap().name, "users");
        assert!(table.lookup("/health").is_none());
        assert!(table.lookup("/api/usersx").is_none());
    }

    #[test]
    fn test_target_uri_preserves_path_and_query() {
        let table = table();
        let pq = PathAndQuery::from_static("/api/users/7?fields=email");
        let uri = table.lookup("/api/users/7").unwrap().backend.target_uri(Some(&pq)).unwrap();
        assert_eq!(uri.to_string(), "http://users:3001/api/users/7?fields=email");

        let pq = PathAndQuery::from_static("/api/rides");
        let uri = table.lookup("/api/rides").unwrap().backend.target_uri(Some(&pq)).unwrap();
        assert_eq!(uri.to_string(), "http://rides:3002/v1/api/rides");
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let err = RouteTable::from_config(&[RouteConfig::new("x", "/x", "https://secure")]).unwrap_err();
        assert!(matches!(err, RouteError::InvalidBackend { .. }));
    }

    #[test]
    fn test_public_routes_require_method_and_prefix() {
        let public = PublicRoutes::from_config(&[
            PublicRouteConfig::new("POST", "/api/users/register"),
            PublicRouteConfig::new("post", "/api/users/login"),
        ])
        .unwrap();

        assert!(public.is_public(&Method::POST, "/api/users/login"));
        assert!(public.is_public(&Method::POST, "/api/users/register"));
        assert!(!public.is_public(&Method::GET, "/api/users/login"));
        assert!(!public.is_public(&Method::POST, "/api/users/me"));
    }
}
