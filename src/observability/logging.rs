//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the configured level parse.
const FALLBACK_FILTER: &str = "edge_gateway=info,tower_http=info";

/// Build the filter: `RUST_LOG` wins, then the configured level, then the fallback.
pub fn build_filter(configured_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives_for(configured_level)))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(configured_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(configured_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// A bare level ("debug") applies to this crate and tower_http; anything else is
/// taken as a full directive string.
fn directives_for(level: &str) -> String {
    let level = level.trim();
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => {
            format!("edge_gateway={level},tower_http={level}")
        }
        other => other.to_string(),
    }
}
