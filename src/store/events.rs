//! Listener for state-change announcements published by backend services.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::SharedStore;
use crate::observability::metrics;

/// Subscribes to pub/sub channels and logs every announcement until shutdown.
pub struct EventListener {
    store: Arc<dyn SharedStore>,
    channels: Vec<String>,
}

impl EventListener {
    pub fn new(store: Arc<dyn SharedStore>, channels: Vec<String>) -> Self {
        Self { store, channels }
    }

    /// Run until `shutdown` fires or every subscription has closed.
    ///
    /// A channel that cannot be subscribed is logged and skipped.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut tasks = tokio::task::JoinSet::new();

        for channel in &self.channels {
            let mut subscription = match self.store.subscribe(channel).await {
                Ok(sub) => sub,
                Err(e) => {
                    tracing::error!(channel = %channel, error = %e, "Failed to subscribe to store channel");
                    metrics::record_store_error("events");
                    continue;
                }
            };
            tracing::info!(channel = %channel, "Subscribed to store channel");

            tasks.spawn(async move {
                while let Some(message) = subscription.next_message().await {
                    tracing::debug!(channel = %subscription.channel(), message = %message, "Store event");
                    metrics::record_store_event(subscription.channel());
                }
            });
        }

        if tasks.is_empty() {
            return;
        }

        tokio::select! {
            _ = async { while tasks.join_next().await.is_some() {} } => {
                tracing::info!("All store subscriptions closed");
            }
            _ = shutdown.recv() => {
                tracing::info!("Event listener received shutdown signal");
            }
        }
        tasks.abort_all();
    }
}
