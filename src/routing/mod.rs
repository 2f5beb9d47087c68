//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (public-route allowlist, route table lookup)
//!     → matcher.rs (evaluate method / path-prefix conditions)
//!     → Return: matched Route or None
//!
//! Route compilation (at startup):
//!     RouteConfig[] / PublicRouteConfig[]
//!     → parse backend base URLs, compile matchers
//!     → freeze as immutable RouteTable / PublicRoutes
//! ```
//!
//! # Design Decisions
//! - Tables built once at startup, immutable at runtime
//! - No regex in the hot path (prefix matching only)
//! - First match wins, in configured order

pub mod matcher;
pub mod router;

pub use matcher::{AndMatcher, Matcher, MethodMatcher, PathPrefixMatcher};
pub use router::{Backend, PublicRoutes, Route, RouteError, RouteTable};
