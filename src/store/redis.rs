//! Redis-backed [`SharedStore`].
//!
//! Commands go through one multiplexed `ConnectionManager`, which reconnects
//! on its own after a dropped connection. The manager is created on first
//! use, so an unreachable server at boot surfaces as per-operation
//! `StoreError`s instead of a failed start. Pub/sub uses a dedicated
//! connection per subscription because a subscribed connection cannot issue
//! commands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tokio::sync::{mpsc, OnceCell};

use super::{SharedStore, StoreError, StoreFuture, Subscription};

/// INCR and EXPIRE in one round-trip so a crash between them cannot leave a
/// counter without a TTL.
const INCR_WITH_TTL: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    url: String,
    op_timeout: Duration,
    incr_script: redis::Script,
}

impl RedisStore {
    /// Prepare a store for `url` (`redis://` or `rediss://`) without
    /// connecting. Only a malformed URL fails here.
    pub fn open(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        Ok(Self {
            client,
            conn: Arc::new(OnceCell::new()),
            url: redact(url),
            op_timeout,
            incr_script: redis::Script::new(INCR_WITH_TTL),
        })
    }

    /// Open and connect immediately, failing if the server is unreachable.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let store = Self::open(url, op_timeout)?;
        store.ping().await?;
        Ok(store)
    }

    /// Establish the command connection if it is not up yet.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .get_or_try_init(|| async {
                let conn = tokio::time::timeout(self.op_timeout, ConnectionManager::new(self.client.clone()))
                    .await
                    .map_err(|_| StoreError::Timeout(self.op_timeout))?
                    .map_err(map_redis_error)?;
                tracing::info!(url = %self.url, "Connected to shared store");
                Ok::<_, StoreError>(conn)
            })
            .await
            .cloned()
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result.map_err(map_redis_error),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

impl SharedStore for RedisStore {
    fn incr_with_ttl<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let mut invocation = self.incr_script.key(key);
            invocation.arg(ttl.as_secs().max(1));
            self.bounded(invocation.invoke_async(&mut conn)).await
        })
    }

    fn ttl<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let secs: i64 = self.bounded(conn.ttl(key)).await?;
            // -2: missing key, -1: no expiry.
            Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            self.bounded(conn.get(key)).await
        })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            self.bounded(conn.set_ex(key, value, ttl.as_secs().max(1))).await
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let removed: i64 = self.bounded(conn.del(key)).await?;
            Ok(removed > 0)
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let _receivers: i64 = self.bounded(conn.publish(channel, message)).await?;
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, Subscription> {
        Box::pin(async move {
            let mut pubsub = self.bounded(self.client.get_async_pubsub()).await?;
            self.bounded(pubsub.subscribe(channel)).await?;

            let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
            let name = channel.to_string();

            tokio::spawn(async move {
                let mut messages = pubsub.into_on_message();
                while let Some(msg) = messages.next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(channel = %name, error = %e, "Dropping undecodable pub/sub payload");
                            continue;
                        }
                    };
                    if tx.send(payload).await.is_err() {
                        break;
                    }
                }
                tracing::debug!(channel = %name, "Pub/sub stream ended");
            });

            Ok(Subscription::new(channel, rx))
        })
    }
}

fn map_redis_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

/// Strip credentials from a connection URL before it is logged.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_hides_password() {
        assert_eq!(redact("redis://:hunter2@cache:6379"), "redis://:***@cache:6379");
        assert_eq!(redact("redis://localhost:6379"), "redis://localhost:6379");
        assert_eq!(redact("not a url"), "<invalid url>");
    }

    #[test]
    fn test_open_rejects_malformed_url() {
        assert!(RedisStore::open("not a url", Duration::from_secs(1)).is_err());
        assert!(RedisStore::open("redis://localhost:6379", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_per_operation() {
        let store = RedisStore::open("redis://127.0.0.1:1", Duration::from_millis(300)).unwrap();

        let err = store.get("session:1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_) | StoreError::Timeout(_)));
        assert!(store.incr_with_ttl("rate:1", Duration::from_secs(60)).await.is_err());
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis: docker run -d -p 6379:6379 redis:7
    async fn test_counter_and_session_round_trip() {
        let store = RedisStore::connect("redis://localhost:6379", Duration::from_secs(1))
            .await
            .unwrap();

        store.del("test:rate").await.unwrap();
        assert_eq!(store.incr_with_ttl("test:rate", Duration::from_secs(60)).await, Ok(1));
        assert_eq!(store.incr_with_ttl("test:rate", Duration::from_secs(60)).await, Ok(2));
        assert!(store.ttl("test:rate").await.unwrap().is_some());

        store.set_ex("test:session", "tok", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("test:session").await, Ok(Some("tok".to_string())));
        assert_eq!(store.del("test:session").await, Ok(true));
    }
}
