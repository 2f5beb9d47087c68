//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit, timeout)
//!     → request.rs (RequestView: method, path, client address)
//!     → pipeline.rs (rate limit → auth, short-circuit on rejection)
//!     → dispatch.rs (prefix match → backend, or the gateway's own endpoints)
//!     → Backend response relayed to client
//! ```

pub mod dispatch;
pub mod pipeline;
pub mod request;
pub mod server;

pub use dispatch::Dispatcher;
pub use pipeline::{Decision, Pipeline, Stage, StageContext};
pub use request::{RequestView, X_REQUEST_ID};
pub use server::HttpServer;
