use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axis_bus::BusPublisher;
use axis_schema::BusMessage;
use axis_store::EventStore;
use tokio::task::JoinHandle;

/// Turns rows written or deleted by other processes into bus messages.
///
/// Tracks the highest row id and the row count. Every row above the id is
/// announced; a count lower than the new rows explain means something was
/// deleted, and since the row is gone its id and subject are unknown.
pub struct StorePoller {
    store: Arc<EventStore>,
    publisher: BusPublisher,
    last_seen: i64,
    last_count: usize,
}

impl StorePoller {
    pub async fn new(store: Arc<EventStore>, publisher: BusPublisher) -> Result<Self> {
        let last_seen = store.latest_id().await?.unwrap_or(0);
        let (_, last_count) = store.changes_since(last_seen).await?;
        Ok(Self {
            store,
            publisher,
            last_seen,
            last_count,
        })
    }

    /// One poll. Returns whether anything was published.
    pub async fn tick(&mut self) -> Result<bool> {
        let (newer, count) = self.store.changes_since(self.last_seen).await?;
        let expected = self.last_count + newer.len();
        let mut published = false;

        for event in newer {
            self.last_seen = self.last_seen.max(event.id);
            self.publisher
                .publish(BusMessage::EventLogged { event })
                .await?;
            published = true;
        }

        if count < expected {
            tracing::debug!(removed = expected - count, "rows removed outside this process");
            self.publisher
                .publish(BusMessage::EventRemoved {
                    id: None,
                    subject: None,
                })
                .await?;
            published = true;
        }

        self.last_count = count;
        Ok(published)
    }

    pub fn spawn(mut self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick().await {
                    tracing::warn!("store poll failed: {e:#}");
                }
            }
        })
    }
}
