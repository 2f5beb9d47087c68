//! In-process [`SharedStore`] for tests and single-node development.
//!
//! Expiry uses `tokio::time::Instant`, so paused test clocks drive TTLs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use super::{SharedStore, StoreError, StoreFuture, Subscription};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: DashMap<String, Slot>,
    channels: DashMap<String, broadcast::Sender<String>>,
    offline: AtomicBool,
}

/// Thread-safe store keeping keys and channels in memory.
///
/// [`MemoryStore::set_available`] simulates an outage: while unavailable every
/// operation fails with [`StoreError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Inner>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.0.offline.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.0.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn incr_now(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        self.check_available()?;
        let now = Instant::now();

        match self.0.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let slot = occupied.get_mut();
                let current: i64 = slot.value.parse().map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                })?;
                let next = current + 1;
                slot.value = next.to_string();
                Ok(next)
            }
            Entry::Occupied(mut stale) => {
                stale.insert(Slot {
                    value: "1".to_string(),
                    expires_at: Some(now + ttl),
                });
                Ok(1)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: "1".to_string(),
                    expires_at: Some(now + ttl),
                });
                Ok(1)
            }
        }
    }

    fn live_slot(&self, key: &str) -> Result<Option<Slot>, StoreError> {
        self.check_available()?;
        let now = Instant::now();
        let slot = self.0.entries.get(key).map(|slot| slot.clone());

        match slot {
            Some(slot) if slot.is_live(now) => Ok(Some(slot)),
            Some(_) => {
                self.0.entries.remove_if(key, |_, slot| !slot.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.0
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl SharedStore for MemoryStore {
    fn incr_with_ttl<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, i64> {
        Box::pin(async move { self.incr_now(key, ttl) })
    }

    fn ttl<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Duration>> {
        Box::pin(async move {
            let now = Instant::now();
            Ok(self
                .live_slot(key)?
                .and_then(|slot| slot.expires_at)
                .map(|at| at.saturating_duration_since(now)))
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.live_slot(key)?.map(|slot| slot.value)) })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            self.0.entries.insert(
                key.to_string(),
                Slot {
                    value: value.to_string(),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(())
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let now = Instant::now();
            Ok(self
                .0
                .entries
                .remove(key)
                .is_some_and(|(_, slot)| slot.is_live(now)))
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, message: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            // No subscribers is not an error, same as Redis PUBLISH returning 0.
            let _ = self.sender(channel).send(message.to_string());
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, Subscription> {
        Box::pin(async move {
            self.check_available()?;
            let mut source = self.sender(channel).subscribe();
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

            tokio::spawn(async move {
                loop {
                    match source.recv().await {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Memory subscription lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            Ok(Subscription::new(channel, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_incr_sets_ttl_only_on_create() {
        let store = MemoryStore::new();

        assert_eq!(store.incr_with_ttl("k", Duration::from_secs(60)).await, Ok(1));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.incr_with_ttl("k", Duration::from_secs(60)).await, Ok(2));

        let ttl = store.ttl("k").await.unwrap().unwrap();
        assert_eq!(ttl, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_restarts_after_expiry() {
        let store = MemoryStore::new();
        store.incr_with_ttl("k", Duration::from_secs(5)).await.unwrap();
        store.incr_with_ttl("k", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.ttl("k").await, Ok(None));
        assert_eq!(store.incr_with_ttl("k", Duration::from_secs(5)).await, Ok(1));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set_ex("k", "abc", Duration::from_secs(5)).await.unwrap();

        let err = store.incr_with_ttl("k", Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, StoreError::InvalidValue { key: "k".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_get_del() {
        let store = MemoryStore::new();
        store.set_ex("session:1", "t1", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("session:1").await, Ok(Some("t1".to_string())));

        store.set_ex("session:1", "t2", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("session:1").await, Ok(Some("t2".to_string())));

        assert_eq!(store.del("session:1").await, Ok(true));
        assert_eq!(store.del("session:1").await, Ok(false));
        assert_eq!(store.get("session:1").await, Ok(None));

        store.set_ex("session:2", "t", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("session:2").await, Ok(None));
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(store.get("k").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.incr_with_ttl("k", Duration::from_secs(1)).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_available(true);
        assert_eq!(store.get("k").await, Ok(None));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("events").await.unwrap();
        assert_eq!(sub.channel(), "events");

        store.publish("events", "hello").await.unwrap();
        assert_eq!(sub.next_message().await.as_deref(), Some("hello"));
    }
}
