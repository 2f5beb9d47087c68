//! Route matching logic.
//!
//! # Design Decisions
//! - Method matching is exact
//! - Path matching is case-sensitive and segment-aware: `/api/users` matches
//!   `/api/users` and `/api/users/42` but not `/api/usersx`
//! - Combined conditions use AND semantics

use axum::http::Method;

/// Condition evaluated against a request's method and path.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches the HTTP method exactly.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        *method == self.method
    }
}

/// Matches the request path prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing `/` is ignored, except for
    /// the root prefix, which matches every path.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches_path(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.matches_path(path)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_matcher() {
        let matcher = MethodMatcher::new(Method::POST);
        assert!(matcher.matches(&Method::POST, "/anything"));
        assert!(!matcher.matches(&Method::GET, "/anything"));
    }

    #[test]
    fn test_path_matcher_respects_segments() {
        let matcher = PathPrefixMatcher::new("/api/users");

        assert!(matcher.matches_path("/api/users"));
        assert!(matcher.matches_path("/api/users/42/profile"));
        assert!(!matcher.matches_path("/api/usersx"));
        assert!(!matcher.matches_path("/api"));
        assert!(!matcher.matches_path("/API/users"));
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert_eq!(PathPrefixMatcher::new("/api/").prefix(), "/api");
        assert!(PathPrefixMatcher::new("/api/").matches_path("/api/rides"));

        let root = PathPrefixMatcher::new("/");
        assert!(root.matches_path("/"));
        assert!(root.matches_path("/health"));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(MethodMatcher::new(Method::POST)),
            Box::new(PathPrefixMatcher::new("/api/users/login")),
        ]);

        assert!(matcher.matches(&Method::POST, "/api/users/login"));
        assert!(!matcher.matches(&Method::GET, "/api/users/login"));
        assert!(!matcher.matches(&Method::POST, "/api/users/me"));
    }
}
