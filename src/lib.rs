//! Edge API gateway library.
//!
//! Every request runs the same pipeline: a fixed-window rate limiter,
//! then a session authenticator, then a path-prefix dispatcher that relays
//! the backend's response unchanged.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod store;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::{MemoryStore, RedisStore, SharedStore};
