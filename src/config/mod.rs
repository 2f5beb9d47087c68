//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional)
//!     → loader.rs (parse & deserialize, then environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value/Arc with every subsystem
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; the route table never changes afterwards
//! - All fields have defaults so an empty file (or none) is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, EventsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, PublicRouteConfig,
    RateLimitConfig, RouteConfig, StoreConfig, TimeoutConfig, DEV_JWT_SECRET,
};
pub use validation::{validate_config, ValidationError};
