//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages, dispatcher, store listener produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Internal failure detail goes to logs only, never to clients
//! - Metric updates are cheap enough for the hot path

pub mod logging;
pub mod metrics;
