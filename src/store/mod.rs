//! Shared session/counter store.
//!
//! # Data Flow
//! ```text
//! Rate limiter      → incr_with_ttl + ttl      (rate:<client>)
//! Authenticator     → get                      (session:<subject>)
//! Session issuer    → set_ex / del + publish   (session:<subject>, session-events)
//! Event listener    → subscribe                (configured channels)
//! ```
//!
//! # Design Decisions
//! - The store is injected as `Arc<dyn SharedStore>`, never a global
//! - All cross-request state lives here; the gateway keeps none in-process
//! - Every operation is a single suspension point returning `StoreError` on failure;
//!   the calling stage decides whether that means fail open or fail closed

pub mod events;
pub mod memory;
pub mod redis;

pub use events::EventListener;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;

/// Boxed future returned by every [`SharedStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key-value store with per-key TTL, atomic counters and publish/subscribe.
pub trait SharedStore: Send + Sync {
    /// Atomically increments `key`, creating it at 1. When the post-increment
    /// value is 1 the key's TTL is set to `ttl`. Returns the post-increment value.
    fn incr_with_ttl<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, i64>;

    /// Remaining TTL of `key`; `None` if the key is missing or never expires.
    fn ttl<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>>;

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    /// Sets `key` to `value`, replacing any previous value and TTL.
    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Deletes `key`, returning whether it existed.
    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()>;

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, Subscription>;
}

/// Errors surfaced by [`SharedStore`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("value at key {key} is not an integer")]
    InvalidValue { key: String },
}

/// Stream of messages published on one channel.
///
/// Ends when the store side of the subscription goes away.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub(crate) fn new(channel: impl Into<String>, rx: mpsc::Receiver<String>) -> Self {
        Self {
            channel: channel.into(),
            rx,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next message payload, or `None` once the subscription is closed.
    pub async fn next_message(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Key under which the rate counter for `client_id` lives.
pub fn rate_key(prefix: &str, client_id: &str) -> String {
    format!("{prefix}{client_id}")
}

/// Key under which the session record for `subject_id` lives.
pub fn session_key(prefix: &str, subject_id: &str) -> String {
    format!("{prefix}{subject_id}")
}
